//! # stratum-catalog
//!
//! Built-in component types. Each type supplies its config schema, the
//! fallback, platform and compliance layers of the precedence chain, the
//! values compliance frameworks mandate, a normalizer, and the capabilities
//! its instances provide.
//!
//! | type | capability |
//! |------|------------|
//! | `lambda-api` | `api:rest` |
//! | `ecs-fargate-service` | `service:connect` |
//! | `rds-postgres` | `db:postgres` |
//! | `s3-bucket` | `bucket:s3` |
//! | `sqs-queue` | `queue:sqs` |
//! | `iam-role` | `iam:assumeRole` |

mod fields;

pub mod fargate;
pub mod iam_role;
pub mod lambda_api;
pub mod rds_postgres;
pub mod s3_bucket;
pub mod sqs_queue;

use std::sync::Arc;
use stratum_core::{ComponentDefinition, ComponentRegistry, RegistryError};

pub use fargate::FargateService;
pub use iam_role::IamRole;
pub use lambda_api::LambdaApi;
pub use rds_postgres::RdsPostgres;
pub use s3_bucket::S3Bucket;
pub use sqs_queue::SqsQueue;

/// Every built-in definition.
pub fn builtin_definitions() -> Vec<Arc<dyn ComponentDefinition>> {
    vec![
        Arc::new(LambdaApi),
        Arc::new(FargateService),
        Arc::new(RdsPostgres),
        Arc::new(S3Bucket),
        Arc::new(SqsQueue),
        Arc::new(IamRole),
    ]
}

/// Registry holding every built-in type.
pub fn builtin_registry() -> Result<ComponentRegistry, RegistryError> {
    let registry = builtin_definitions()
        .into_iter()
        .fold(ComponentRegistry::builder(), |builder, definition| {
            builder.register(definition)
        })
        .build()?;
    tracing::debug!(types = ?registry.type_names(), "Built-in component registry ready");
    Ok(registry)
}
