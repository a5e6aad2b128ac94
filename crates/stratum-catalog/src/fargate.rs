//! `ecs-fargate-service`: a long-running container service.
//!
//! Fargate only accepts specific (cpu, memory) pairs. When `memory` is
//! omitted the normalizer picks the smallest size valid for the configured
//! `cpu`; an explicit pair outside the table is rejected with the list of
//! valid sizes.

use crate::fields::{fill_default, whole_number_field};
use serde_json::{Map, Value, json};
use stratum_core::{
    CapabilityDeclaration, ComplianceFramework, ComponentDefinition, NormalizeContext,
    NormalizeError,
};

pub const TYPE_NAME: &str = "ecs-fargate-service";

/// Valid memory sizes (MiB) for a Fargate cpu value, or `None` for an
/// unsupported cpu.
pub fn valid_memory_for_cpu(cpu: u64) -> Option<Vec<u64>> {
    let sizes = match cpu {
        256 => vec![512, 1024, 2048],
        512 => (1..=4).map(|gb| gb * 1024).collect(),
        1024 => (2..=8).map(|gb| gb * 1024).collect(),
        2048 => (4..=16).map(|gb| gb * 1024).collect(),
        4096 => (8..=30).map(|gb| gb * 1024).collect(),
        _ => return None,
    };
    Some(sizes)
}

pub struct FargateService;

impl ComponentDefinition for FargateService {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn description(&self) -> &'static str {
        "Container service on ECS Fargate"
    }

    fn config_schema(&self) -> &'static str {
        include_str!("../schemas/ecs-fargate-service.schema.json")
    }

    fn hardcoded_fallbacks(&self) -> Value {
        json!({
            "image": "public.ecr.aws/nginx/nginx:stable",
            "cpu": 256,
            "port": 8080,
            "desiredCount": 1,
            "healthCheckPath": "/health",
            "assignPublicIp": false,
            "logRetentionDays": 14,
            "environment": {}
        })
    }

    fn platform_defaults(&self) -> Value {
        json!({ "cpu": 512 })
    }

    fn compliance_overlay(&self, framework: ComplianceFramework) -> Value {
        match framework {
            ComplianceFramework::Commercial => json!({ "logRetentionDays": 14 }),
            ComplianceFramework::FedrampModerate => json!({
                "logRetentionDays": 90,
                "desiredCount": 2
            }),
            ComplianceFramework::FedrampHigh => json!({
                "logRetentionDays": 365,
                "desiredCount": 2
            }),
        }
    }

    fn policy_mandates(&self, framework: ComplianceFramework) -> Value {
        if framework.is_fedramp() {
            json!({ "assignPublicIp": false })
        } else {
            json!({})
        }
    }

    fn declared_capabilities(&self) -> Vec<CapabilityDeclaration> {
        vec![CapabilityDeclaration::new(
            "service:connect",
            &["endpoint", "port", "serviceArn", "securityGroupId"],
        )]
    }

    fn normalize(
        &self,
        config: &mut Map<String, Value>,
        ctx: &NormalizeContext<'_>,
    ) -> Result<(), NormalizeError> {
        fill_default(config, "serviceName", ctx.default_resource_name());

        let cpu = whole_number_field(config, "cpu")?.unwrap_or(256);
        let valid = valid_memory_for_cpu(cpu).ok_or_else(|| {
            NormalizeError::new("cpu", format!("cpu {} is not a supported Fargate size", cpu))
                .with_suggestion("Use one of: 256, 512, 1024, 2048, 4096")
        })?;

        match whole_number_field(config, "memory")? {
            None => {
                // First entry is the smallest size for this cpu.
                config.insert("memory".to_string(), json!(valid[0]));
            }
            Some(memory) if valid.contains(&memory) => {}
            Some(memory) => {
                let options = valid
                    .iter()
                    .map(u64::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(NormalizeError::new(
                    "memory",
                    format!(
                        "memory {} is not valid for cpu {}; valid memory values: {}",
                        memory, cpu, options
                    ),
                )
                .with_suggestion(format!("Set `memory` to one of: {}", options)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stratum_core::ComponentContext;

    fn normalize(config: Value) -> Result<Value, NormalizeError> {
        let context = ComponentContext::new("orders", "dev");
        let mut map = config.as_object().cloned().unwrap_or_default();
        FargateService.normalize(
            &mut map,
            &NormalizeContext {
                context: &context,
                component_name: "worker",
            },
        )?;
        Ok(Value::Object(map))
    }

    #[test]
    fn selects_memory_from_cpu_table() {
        let config = normalize(json!({"cpu": 1024})).unwrap();
        assert_eq!(config["memory"], 2048);
        assert_eq!(config["serviceName"], "orders-worker");
    }

    #[test]
    fn accepts_valid_pair() {
        let config = normalize(json!({"cpu": 512, "memory": 3072})).unwrap();
        assert_eq!(config["memory"], 3072);
    }

    #[test]
    fn invalid_pair_enumerates_valid_memory() {
        let err = normalize(json!({"cpu": 256, "memory": 4096})).unwrap_err();
        assert_eq!(err.field, "memory");
        assert!(err.message.contains("512, 1024, 2048"), "{}", err.message);
    }

    #[test]
    fn integral_float_sizes_are_honoured() {
        let config = normalize(json!({"cpu": 4096.0})).unwrap();
        assert_eq!(config["cpu"], json!(4096));
        assert_eq!(config["memory"], json!(8192));

        let err = normalize(json!({"cpu": 4096.0, "memory": 512.0})).unwrap_err();
        assert_eq!(err.field, "memory");
        assert!(err.message.contains("cpu 4096"), "{}", err.message);
    }

    #[test]
    fn fractional_cpu_is_rejected() {
        let err = normalize(json!({"cpu": 1024.5})).unwrap_err();
        assert_eq!(err.field, "cpu");
    }

    #[test]
    fn table_covers_fargate_ranges() {
        assert_eq!(valid_memory_for_cpu(4096).unwrap().last(), Some(&30720));
        assert_eq!(valid_memory_for_cpu(2048).unwrap().len(), 13);
        assert!(valid_memory_for_cpu(300).is_none());
    }
}
