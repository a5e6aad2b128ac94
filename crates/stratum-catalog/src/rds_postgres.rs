//! `rds-postgres`: a managed PostgreSQL instance.

use crate::fields::{fill_default, whole_number_field};
use serde_json::{Map, Value, json};
use stratum_core::{
    CapabilityDeclaration, ComplianceFramework, ComponentDefinition, NormalizeContext,
    NormalizeError,
};

pub const TYPE_NAME: &str = "rds-postgres";

const MAX_DATABASE_NAME: usize = 63;

pub struct RdsPostgres;

impl ComponentDefinition for RdsPostgres {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn description(&self) -> &'static str {
        "Managed PostgreSQL database"
    }

    fn config_schema(&self) -> &'static str {
        include_str!("../schemas/rds-postgres.schema.json")
    }

    fn hardcoded_fallbacks(&self) -> Value {
        json!({
            "engineVersion": "16",
            "instanceClass": "db.t4g.micro",
            "allocatedStorage": 20,
            "storageEncrypted": false,
            "backupRetentionDays": 1,
            "multiAz": false,
            "port": 5432,
            "deletionProtection": false
        })
    }

    fn platform_defaults(&self) -> Value {
        json!({
            "storageEncrypted": true,
            "backupRetentionDays": 7
        })
    }

    fn compliance_overlay(&self, framework: ComplianceFramework) -> Value {
        match framework {
            ComplianceFramework::Commercial => json!({}),
            ComplianceFramework::FedrampModerate => json!({
                "backupRetentionDays": 14,
                "multiAz": true,
                "deletionProtection": true
            }),
            ComplianceFramework::FedrampHigh => json!({
                "backupRetentionDays": 35,
                "multiAz": true,
                "deletionProtection": true,
                "instanceClass": "db.r6g.large"
            }),
        }
    }

    fn policy_mandates(&self, framework: ComplianceFramework) -> Value {
        match framework {
            ComplianceFramework::Commercial => json!({}),
            ComplianceFramework::FedrampModerate => json!({ "storageEncrypted": true }),
            ComplianceFramework::FedrampHigh => json!({
                "storageEncrypted": true,
                "deletionProtection": true
            }),
        }
    }

    fn declared_capabilities(&self) -> Vec<CapabilityDeclaration> {
        vec![CapabilityDeclaration::new(
            "db:postgres",
            &[
                "host",
                "port",
                "databaseName",
                "secretArn",
                "instanceArn",
                "securityGroupId",
            ],
        )]
    }

    fn normalize(
        &self,
        config: &mut Map<String, Value>,
        ctx: &NormalizeContext<'_>,
    ) -> Result<(), NormalizeError> {
        fill_default(config, "databaseName", database_name(ctx));

        if let Some(name) = config.get("databaseName").and_then(Value::as_str)
            && name.len() > MAX_DATABASE_NAME
        {
            return Err(NormalizeError::new(
                "databaseName",
                format!("database name '{}' exceeds {} characters", name, MAX_DATABASE_NAME),
            ));
        }

        let allocated = whole_number_field(config, "allocatedStorage")?.unwrap_or(20);
        if let Some(max) = whole_number_field(config, "maxAllocatedStorage")?
            && max < allocated
        {
            return Err(NormalizeError::new(
                "maxAllocatedStorage",
                format!(
                    "maxAllocatedStorage ({}) must be at least allocatedStorage ({})",
                    max, allocated
                ),
            )
            .with_suggestion(format!(
                "Raise `maxAllocatedStorage` to {} or more, or remove it",
                allocated
            )));
        }

        let encrypted = config
            .get("storageEncrypted")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if config.contains_key("kmsKeyAlias") && !encrypted {
            return Err(NormalizeError::new(
                "kmsKeyAlias",
                "a KMS key is configured but storageEncrypted is false",
            )
            .with_suggestion("Set `storageEncrypted: true` or remove `kmsKeyAlias`"));
        }

        Ok(())
    }
}

/// `service_component` with hyphens folded to underscores.
fn database_name(ctx: &NormalizeContext<'_>) -> String {
    ctx.default_resource_name().replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::ComponentContext;

    fn normalize(config: Value) -> Result<Value, NormalizeError> {
        let context = ComponentContext::new("order-service", "dev");
        let mut map = config.as_object().cloned().unwrap_or_default();
        RdsPostgres.normalize(
            &mut map,
            &NormalizeContext {
                context: &context,
                component_name: "main-db",
            },
        )?;
        Ok(Value::Object(map))
    }

    #[test]
    fn derives_database_name() {
        let config = normalize(json!({})).unwrap();
        assert_eq!(config["databaseName"], "order_service_main_db");
    }

    #[test]
    fn max_storage_must_cover_allocated() {
        let err = normalize(json!({"allocatedStorage": 100, "maxAllocatedStorage": 50})).unwrap_err();
        assert_eq!(err.field, "maxAllocatedStorage");
        assert!(normalize(json!({"allocatedStorage": 100, "maxAllocatedStorage": 200})).is_ok());
    }

    #[test]
    fn kms_key_requires_encryption() {
        let err = normalize(json!({"kmsKeyAlias": "alias/db", "storageEncrypted": false})).unwrap_err();
        assert_eq!(err.field, "kmsKeyAlias");
    }

    #[test]
    fn fedramp_high_mandates_encryption() {
        let mandates = RdsPostgres.policy_mandates(ComplianceFramework::FedrampHigh);
        assert_eq!(mandates["storageEncrypted"], true);
    }
}
