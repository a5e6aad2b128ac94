//! `lambda-api`: an HTTP API backed by a single function.

use crate::fields::{fill_default, object_field, str_field};
use serde_json::{Map, Value, json};
use stratum_core::{
    CapabilityDeclaration, ComplianceFramework, ComponentDefinition, NormalizeContext,
    NormalizeError,
};

pub const TYPE_NAME: &str = "lambda-api";

const MAX_FUNCTION_NAME: usize = 64;

pub struct LambdaApi;

impl ComponentDefinition for LambdaApi {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn description(&self) -> &'static str {
        "HTTP API fronting a serverless function"
    }

    fn config_schema(&self) -> &'static str {
        include_str!("../schemas/lambda-api.schema.json")
    }

    fn hardcoded_fallbacks(&self) -> Value {
        json!({
            "handler": "index.handler",
            "runtime": "nodejs20.x",
            "memorySize": 512,
            "timeout": 29,
            "logRetentionDays": 14,
            "tracing": "PassThrough",
            "environment": {},
            "auth": { "type": "iam", "sessionDurationMinutes": 60 },
            "api": { "stage": "v1" },
            "vpc": { "enabled": false }
        })
    }

    fn platform_defaults(&self) -> Value {
        json!({
            "tracing": "Active",
            "api": { "throttling": { "rateLimit": 100, "burstLimit": 200 } }
        })
    }

    fn compliance_overlay(&self, framework: ComplianceFramework) -> Value {
        match framework {
            ComplianceFramework::Commercial => json!({
                "logRetentionDays": 14,
                "auth": { "sessionDurationMinutes": 60 }
            }),
            ComplianceFramework::FedrampModerate => json!({
                "logRetentionDays": 90,
                "auth": { "sessionDurationMinutes": 30 }
            }),
            ComplianceFramework::FedrampHigh => json!({
                "logRetentionDays": 365,
                "auth": { "sessionDurationMinutes": 15 }
            }),
        }
    }

    fn policy_mandates(&self, framework: ComplianceFramework) -> Value {
        match framework {
            ComplianceFramework::FedrampHigh => json!({ "vpc": { "enabled": true } }),
            _ => json!({}),
        }
    }

    fn declared_capabilities(&self) -> Vec<CapabilityDeclaration> {
        vec![CapabilityDeclaration::new(
            "api:rest",
            &["url", "apiId", "functionArn", "roleArn"],
        )]
    }

    fn normalize(
        &self,
        config: &mut Map<String, Value>,
        ctx: &NormalizeContext<'_>,
    ) -> Result<(), NormalizeError> {
        fill_default(config, "functionName", ctx.default_resource_name());
        if let Some(name) = str_field(config, "functionName")
            && name.len() > MAX_FUNCTION_NAME
        {
            return Err(NormalizeError::new(
                "functionName",
                format!(
                    "function name '{}' is {} characters; the limit is {}",
                    name,
                    name.len(),
                    MAX_FUNCTION_NAME
                ),
            )
            .with_suggestion("Set a shorter `functionName` explicitly"));
        }

        let auth_type = object_field(config, "auth")
            .and_then(|auth| auth.get("type"))
            .and_then(Value::as_str);
        if auth_type == Some("none") && ctx.context.compliance_framework.is_fedramp() {
            return Err(NormalizeError::new(
                "auth.type",
                format!(
                    "unauthenticated APIs are not permitted under {}",
                    ctx.context.compliance_framework
                ),
            )
            .with_suggestion("Use `auth.type: iam` or `auth.type: jwt`"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::ComponentContext;

    fn normalize(config: Value, context: &ComponentContext) -> Result<Value, NormalizeError> {
        let mut map = config.as_object().cloned().unwrap_or_default();
        LambdaApi.normalize(
            &mut map,
            &NormalizeContext {
                context,
                component_name: "api",
            },
        )?;
        Ok(Value::Object(map))
    }

    #[test]
    fn derives_function_name() {
        let context = ComponentContext::new("orders", "dev");
        let config = normalize(json!({}), &context).unwrap();
        assert_eq!(config["functionName"], "orders-api");

        let config = normalize(json!({"functionName": "custom"}), &context).unwrap();
        assert_eq!(config["functionName"], "custom");
    }

    #[test]
    fn rejects_unauthenticated_api_under_fedramp() {
        let context =
            ComponentContext::new("orders", "prod").with_framework(ComplianceFramework::FedrampHigh);
        let err = normalize(json!({"auth": {"type": "none"}}), &context).unwrap_err();
        assert_eq!(err.field, "auth.type");

        let commercial = ComponentContext::new("orders", "prod");
        assert!(normalize(json!({"auth": {"type": "none"}}), &commercial).is_ok());
    }
}
