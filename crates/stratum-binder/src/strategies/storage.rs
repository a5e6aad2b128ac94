//! `bucket:s3`: object storage access for compute.

use super::{COMPUTE_SOURCES, matrix};
use crate::error::BindingError;
use crate::strategy::{
    BinderStrategy, BindingContext, BindingResult, CompatibilityEntry, supported_access,
};
use serde_json::Value;
use stratum_core::AccessLevel;

const CAPABILITY: &str = "bucket:s3";

const READ_ACTIONS: &[&str] = &["s3:GetObject", "s3:ListBucket"];
const WRITE_ACTIONS: &[&str] = &["s3:PutObject", "s3:DeleteObject"];
const ADMIN_ACTIONS: &[&str] = &["s3:*"];

pub struct S3Binder;

impl BinderStrategy for S3Binder {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn capability(&self) -> &'static str {
        CAPABILITY
    }

    fn compatibility_matrix(&self) -> Vec<CompatibilityEntry> {
        matrix(
            CAPABILITY,
            &COMPUTE_SOURCES,
            &[
                AccessLevel::Read,
                AccessLevel::Write,
                AccessLevel::Readwrite,
                AccessLevel::Admin,
            ],
            "Bucket name and object-level IAM grants",
        )
    }

    fn bind(&self, ctx: &BindingContext<'_>) -> Result<BindingResult, BindingError> {
        ctx.require_access(&supported_access(&self.compatibility_matrix(), ctx.source_type))?;

        let arn = ctx.attribute("bucketArn");
        let mut result = ctx.result(self.name());
        result
            .env(ctx, "BUCKET_NAME", ctx.attribute_or_config("bucketName", "bucketName"))
            .env(ctx, "BUCKET_ARN", arn.clone());

        let access = ctx.access();
        if access == AccessLevel::Admin {
            result.grant(ADMIN_ACTIONS, arn.clone());
        } else {
            if access.allows_read() {
                result.grant(READ_ACTIONS, arn.clone());
            }
            if access.allows_write() {
                result.grant(WRITE_ACTIONS, arn.clone());
            }
        }

        let kms_alias = ctx
            .target_config
            .get("encryption")
            .filter(|e| e.get("type").and_then(Value::as_str) == Some("aws:kms"))
            .and_then(|e| e.get("kmsKeyAlias"))
            .cloned();
        if let Some(alias) = kms_alias {
            result.meta("kmsKeyAlias", alias);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::testing::Harness;
    use crate::strategy::BindingValue;
    use serde_json::json;

    #[test]
    fn read_access_only_grants_read_actions() {
        let mut harness = Harness::new("lambda-api", "s3-bucket", CAPABILITY, AccessLevel::Read);
        harness.target_config = json!({"bucketName": "orders-uploads"});
        let result = harness.bind(&S3Binder).unwrap();

        assert_eq!(result.grants.len(), 1);
        assert_eq!(result.grants[0].actions, vec!["s3:GetObject", "s3:ListBucket"]);
        assert_eq!(
            result.environment["BUCKET_NAME"],
            BindingValue::literal("orders-uploads")
        );
    }

    #[test]
    fn readwrite_grants_both_sets_and_reports_kms_key() {
        let mut harness = Harness::new("lambda-api", "s3-bucket", CAPABILITY, AccessLevel::Readwrite);
        harness.target_config = json!({"encryption": {"type": "aws:kms", "kmsKeyAlias": "alias/x"}});
        let result = harness.bind(&S3Binder).unwrap();
        assert_eq!(result.grants.len(), 2);
        assert_eq!(result.metadata["kmsKeyAlias"], "alias/x");
    }

    #[test]
    fn literal_arn_when_target_was_synthesized() {
        let mut harness = Harness::new("lambda-api", "s3-bucket", CAPABILITY, AccessLevel::Admin);
        harness.provided = json!({"bucketArn": "arn:aws:s3:::b"}).as_object().cloned();
        let result = harness.bind(&S3Binder).unwrap();
        assert_eq!(result.grants[0].actions, vec!["s3:*"]);
        assert_eq!(result.grants[0].resource, BindingValue::literal("arn:aws:s3:::b"));
    }
}
