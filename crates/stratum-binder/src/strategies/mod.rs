//! Built-in binder strategies.
//!
//! | capability | strategy | sources |
//! |------------|----------|---------|
//! | `db:postgres` | [`PostgresBinder`] | compute |
//! | `bucket:s3` | [`S3Binder`] | compute |
//! | `queue:sqs` | [`SqsBinder`] | compute |
//! | `iam:assumeRole` | [`AssumeRoleBinder`] | compute, `iam-role` |
//! | `service:connect` | [`ServiceConnectBinder`] | compute |
//!
//! "Compute" is `lambda-api` and `ecs-fargate-service`.

mod database;
mod iam;
mod queue;
mod service;
mod storage;

pub use database::PostgresBinder;
pub use iam::AssumeRoleBinder;
pub use queue::SqsBinder;
pub use service::ServiceConnectBinder;
pub use storage::S3Binder;

use crate::error::BinderRegistryError;
use crate::registry::BinderRegistry;
use crate::strategy::{BinderStrategy, CompatibilityEntry};
use serde_json::Value;
use std::sync::Arc;
use stratum_core::AccessLevel;

/// Component types that run code and can consume bindings.
pub const COMPUTE_SOURCES: [&str; 2] = ["lambda-api", "ecs-fargate-service"];

/// Every built-in strategy.
pub fn builtin_binders() -> Vec<Arc<dyn BinderStrategy>> {
    vec![
        Arc::new(PostgresBinder),
        Arc::new(S3Binder),
        Arc::new(SqsBinder),
        Arc::new(AssumeRoleBinder),
        Arc::new(ServiceConnectBinder),
    ]
}

/// Registry of the built-in strategies, checked for conflicts against
/// `source_types` as well as the types their matrices list.
pub fn builtin_registry<I, S>(source_types: I) -> Result<BinderRegistry, BinderRegistryError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    builtin_binders()
        .into_iter()
        .fold(BinderRegistry::builder(), |builder, strategy| {
            builder.register(strategy)
        })
        .with_source_types(source_types)
        .build()
}

fn matrix(
    capability: &str,
    sources: &[&str],
    access: &[AccessLevel],
    description: &str,
) -> Vec<CompatibilityEntry> {
    sources
        .iter()
        .map(|source| CompatibilityEntry::new(*source, capability, access, description))
        .collect()
}

fn config_port(config: &Value, key: &str, default: u16) -> u16 {
    config
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|port| u16::try_from(port).ok())
        .unwrap_or(default)
}
