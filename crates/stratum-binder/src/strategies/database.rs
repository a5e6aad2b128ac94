//! `db:postgres`: connect compute to a PostgreSQL instance.

use super::{COMPUTE_SOURCES, config_port, matrix};
use crate::error::BindingError;
use crate::strategy::{
    BinderStrategy, BindingContext, BindingResult, CompatibilityEntry, supported_access,
};
use stratum_core::AccessLevel;

const CAPABILITY: &str = "db:postgres";
const DEFAULT_PORT: u16 = 5432;

pub struct PostgresBinder;

impl BinderStrategy for PostgresBinder {
    fn name(&self) -> &'static str {
        "postgres"
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
            "Connection settings, credentials secret and network access",
        )
    }

    fn bind(&self, ctx: &BindingContext<'_>) -> Result<BindingResult, BindingError> {
        ctx.require_access(&supported_access(&self.compatibility_matrix(), ctx.source_type))?;

        let port = config_port(ctx.target_config, "port", DEFAULT_PORT);
        let secret = ctx.attribute("secretArn");

        let mut result = ctx.result(self.name());
        result
            .env(ctx, "DB_HOST", ctx.attribute("host"))
            .env(ctx, "DB_PORT", ctx.attribute_or_config("port", "port"))
            .env(ctx, "DB_NAME", ctx.attribute_or_config("databaseName", "databaseName"))
            .env(ctx, "DB_SECRET_ARN", secret.clone())
            .grant(
                &["secretsmanager:GetSecretValue", "secretsmanager:DescribeSecret"],
                secret,
            )
            .allow(port, "tcp", format!("PostgreSQL from {}", ctx.source))
            .meta("readOnly", ctx.access() == AccessLevel::Read);

        if ctx.access() == AccessLevel::Admin {
            result.grant(
                &["rds:DescribeDBInstances", "rds:RebootDBInstance"],
                ctx.attribute("instanceArn"),
            );
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::testing::Harness;
    use crate::strategy::BindingValue;
    use crate::error::BindingErrorKind;
    use serde_json::json;

    #[test]
    fn emits_connection_env_and_network_rule() {
        let mut harness = Harness::new("lambda-api", "rds-postgres", CAPABILITY, AccessLevel::Readwrite);
        harness.target_config = json!({"port": 5433, "databaseName": "orders_db"});
        harness
            .directive
            .custom_env_vars
            .insert("DB_HOST".into(), "ORDERS_DB_HOST".into());

        let result = harness.bind(&PostgresBinder).unwrap();
        assert!(result.environment.contains_key("ORDERS_DB_HOST"));
        assert!(!result.environment.contains_key("DB_HOST"));
        assert_eq!(result.environment["DB_PORT"], BindingValue::literal(5433));
        assert_eq!(result.environment["DB_NAME"], BindingValue::literal("orders_db"));
        assert!(result.environment["DB_SECRET_ARN"].is_deferred());
        assert_eq!(result.network[0].port, 5433);
        assert_eq!(result.grants.len(), 1);
        assert_eq!(result.metadata["readOnly"], false);
    }

    #[test]
    fn admin_adds_instance_grant() {
        let harness = Harness::new("ecs-fargate-service", "rds-postgres", CAPABILITY, AccessLevel::Admin);
        let result = harness.bind(&PostgresBinder).unwrap();
        assert_eq!(result.grants.len(), 2);
    }

    #[test]
    fn rejects_assume_access() {
        let harness = Harness::new("lambda-api", "rds-postgres", CAPABILITY, AccessLevel::Assume);
        let err = harness.bind(&PostgresBinder).unwrap_err();
        assert_eq!(err.kind, BindingErrorKind::AccessNotSupported);
        assert_eq!(err.path.to_string(), "root.components[0].binds[0].access");
    }
}
