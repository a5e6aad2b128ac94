//! `iam-role`: a standalone role other components can assume.

use crate::fields::{fill_default, str_field};
use serde_json::{Map, Value, json};
use stratum_core::{
    CapabilityDeclaration, ComplianceFramework, ComponentDefinition, NormalizeContext,
    NormalizeError,
};

pub const TYPE_NAME: &str = "iam-role";

const MAX_ROLE_NAME: usize = 64;

pub struct IamRole;

impl ComponentDefinition for IamRole {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn description(&self) -> &'static str {
        "IAM role assumable by other principals"
    }

    fn config_schema(&self) -> &'static str {
        include_str!("../schemas/iam-role.schema.json")
    }

    fn hardcoded_fallbacks(&self) -> Value {
        json!({
            "assumedBy": ["lambda.amazonaws.com"],
            "managedPolicies": [],
            "maxSessionDurationSeconds": 3600
        })
    }

    fn compliance_overlay(&self, framework: ComplianceFramework) -> Value {
        match framework {
            ComplianceFramework::Commercial => json!({}),
            ComplianceFramework::FedrampModerate | ComplianceFramework::FedrampHigh => {
                json!({ "maxSessionDurationSeconds": 3600 })
            }
        }
    }

    fn policy_mandates(&self, framework: ComplianceFramework) -> Value {
        if framework.is_fedramp() {
            json!({ "permissionsBoundary": "platform-permissions-boundary" })
        } else {
            json!({})
        }
    }

    fn declared_capabilities(&self) -> Vec<CapabilityDeclaration> {
        vec![CapabilityDeclaration::new("iam:assumeRole", &["roleArn", "roleName"])]
    }

    fn normalize(
        &self,
        config: &mut Map<String, Value>,
        ctx: &NormalizeContext<'_>,
    ) -> Result<(), NormalizeError> {
        fill_default(config, "roleName", ctx.default_resource_name());
        if let Some(name) = str_field(config, "roleName")
            && name.len() > MAX_ROLE_NAME
        {
            return Err(NormalizeError::new(
                "roleName",
                format!("role name '{}' exceeds {} characters", name, MAX_ROLE_NAME),
            ));
        }
        Ok(())
    }
}
