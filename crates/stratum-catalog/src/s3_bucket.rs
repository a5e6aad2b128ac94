//! `s3-bucket`: object storage.

use crate::fields::{bool_field, fill_default, object_field, str_field};
use serde_json::{Map, Value, json};
use stratum_core::{
    CapabilityDeclaration, ComplianceFramework, ComponentDefinition, NormalizeContext,
    NormalizeError,
};

pub const TYPE_NAME: &str = "s3-bucket";

const MAX_BUCKET_NAME: usize = 63;

pub struct S3Bucket;

impl ComponentDefinition for S3Bucket {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn description(&self) -> &'static str {
        "Object storage bucket"
    }

    fn config_schema(&self) -> &'static str {
        include_str!("../schemas/s3-bucket.schema.json")
    }

    fn hardcoded_fallbacks(&self) -> Value {
        json!({
            "versioned": false,
            "blockPublicAccess": true,
            "encryption": { "type": "AES256" },
            "lifecycleRules": []
        })
    }

    fn compliance_overlay(&self, framework: ComplianceFramework) -> Value {
        match framework {
            ComplianceFramework::Commercial => json!({}),
            ComplianceFramework::FedrampModerate | ComplianceFramework::FedrampHigh => {
                json!({ "versioned": true })
            }
        }
    }

    fn policy_mandates(&self, framework: ComplianceFramework) -> Value {
        match framework {
            ComplianceFramework::Commercial => json!({}),
            ComplianceFramework::FedrampModerate => json!({ "blockPublicAccess": true }),
            ComplianceFramework::FedrampHigh => json!({
                "blockPublicAccess": true,
                "encryption": { "type": "aws:kms" }
            }),
        }
    }

    fn declared_capabilities(&self) -> Vec<CapabilityDeclaration> {
        vec![CapabilityDeclaration::new("bucket:s3", &["bucketName", "bucketArn"])]
    }

    fn normalize(
        &self,
        config: &mut Map<String, Value>,
        ctx: &NormalizeContext<'_>,
    ) -> Result<(), NormalizeError> {
        let derived = format!("{}-{}", ctx.default_resource_name(), ctx.context.account).to_lowercase();
        fill_default(config, "bucketName", derived);

        if let Some(name) = str_field(config, "bucketName")
            && name.len() > MAX_BUCKET_NAME
        {
            return Err(NormalizeError::new(
                "bucketName",
                format!("bucket name '{}' exceeds {} characters", name, MAX_BUCKET_NAME),
            )
            .with_suggestion("Set a shorter `bucketName` explicitly"));
        }

        let lock_enabled = object_field(config, "objectLock")
            .and_then(|lock| lock.get("enabled"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if lock_enabled && !bool_field(config, "versioned") {
            return Err(NormalizeError::new(
                "objectLock.enabled",
                "object lock requires a versioned bucket",
            )
            .with_suggestion("Set `versioned: true`"));
        }

        if let Some(encryption) = config.get_mut("encryption").and_then(Value::as_object_mut)
            && encryption.get("type").and_then(Value::as_str) == Some("aws:kms")
        {
            fill_default(
                encryption,
                "kmsKeyAlias",
                format!("alias/{}", ctx.default_resource_name()),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::ComponentContext;

    fn normalize(config: Value) -> Result<Value, NormalizeError> {
        let context = ComponentContext::new("orders", "dev").with_account("123456789012");
        let mut map = config.as_object().cloned().unwrap_or_default();
        S3Bucket.normalize(
            &mut map,
            &NormalizeContext {
                context: &context,
                component_name: "uploads",
            },
        )?;
        Ok(Value::Object(map))
    }

    #[test]
    fn derives_bucket_name_and_kms_alias() {
        let config = normalize(json!({"encryption": {"type": "aws:kms"}})).unwrap();
        assert_eq!(config["bucketName"], "orders-uploads-123456789012");
        assert_eq!(config["encryption"]["kmsKeyAlias"], "alias/orders-uploads");
    }

    #[test]
    fn object_lock_requires_versioning() {
        let err = normalize(json!({"objectLock": {"enabled": true}})).unwrap_err();
        assert_eq!(err.field, "objectLock.enabled");
        assert!(normalize(json!({"objectLock": {"enabled": true}, "versioned": true})).is_ok());
    }
}
