//! `iam:assumeRole`: let a principal assume a role.

use super::{COMPUTE_SOURCES, matrix};
use crate::error::BindingError;
use crate::strategy::{
    BinderStrategy, BindingContext, BindingResult, CompatibilityEntry, supported_access,
};
use stratum_core::AccessLevel;

const CAPABILITY: &str = "iam:assumeRole";

pub struct AssumeRoleBinder;

impl BinderStrategy for AssumeRoleBinder {
    fn name(&self) -> &'static str {
        "assume-role"
    }

    fn capability(&self) -> &'static str {
        CAPABILITY
    }

    fn compatibility_matrix(&self) -> Vec<CompatibilityEntry> {
        let mut sources = COMPUTE_SOURCES.to_vec();
        sources.push("iam-role");
        matrix(
            CAPABILITY,
            &sources,
            &[AccessLevel::Assume],
            "Role ARN and sts:AssumeRole grant",
        )
    }

    fn bind(&self, ctx: &BindingContext<'_>) -> Result<BindingResult, BindingError> {
        ctx.require_access(&supported_access(&self.compatibility_matrix(), ctx.source_type))?;

        let arn = ctx.attribute("roleArn");
        let mut result = ctx.result(self.name());
        result
            .env(ctx, "ROLE_ARN", arn.clone())
            .grant(&["sts:AssumeRole", "sts:TagSession"], arn);

        if let Some(duration) = ctx.target_config.get("maxSessionDurationSeconds") {
            result.meta("maxSessionDurationSeconds", duration.clone());
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BindingErrorKind;
    use crate::strategies::testing::Harness;

    #[test]
    fn grants_assume_role() {
        let harness = Harness::new("iam-role", "iam-role", CAPABILITY, AccessLevel::Assume);
        let result = harness.bind(&AssumeRoleBinder).unwrap();
        assert!(result.environment.contains_key("ROLE_ARN"));
        assert_eq!(result.grants[0].actions, vec!["sts:AssumeRole", "sts:TagSession"]);
    }

    #[test]
    fn requires_assume_access() {
        let harness = Harness::new("lambda-api", "iam-role", CAPABILITY, AccessLevel::Read);
        let err = harness.bind(&AssumeRoleBinder).unwrap_err();
        assert_eq!(err.kind, BindingErrorKind::AccessNotSupported);
        assert_eq!(err.suggestion.as_deref(), Some("Use one of: assume"));
    }
}
