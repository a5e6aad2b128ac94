//! # stratum-engine
//!
//! The manifest resolution pipeline.
//!
//! [`ResolverEngine`] drives a manifest through parsing, schema validation,
//! context hydration ([`hydrator`]), reference validation ([`references`]),
//! layered configuration building ([`builder`]) and capability binding,
//! producing a [`ResolvedPlan`] or a [`ResolutionFailure`] that names the
//! failed stage and carries every error found.
//!
//! ```ignore
//! let engine = ResolverEngine::new(components, binders, Arc::new(SchemaCache::default()));
//! let context = ComponentContext::new("orders", "prod")
//!     .with_framework(ComplianceFramework::FedrampModerate);
//! match engine.plan(&manifest_text, &context) {
//!     Ok(plan) => println!("{}", plan.to_json_pretty()?),
//!     Err(failure) => eprintln!("{}", failure),
//! }
//! ```

pub mod builder;
pub mod engine;
pub mod error;
pub mod hydrator;
pub mod plan;
pub mod references;

pub use builder::{BuiltConfig, ConfigBuilder, Layer};
pub use engine::{ResolverEngine, Stage};
pub use error::{
    ConfigBuildError, ConfigBuildErrorKind, HydrationError, ReferenceError, ReferenceErrorKind,
    ResolutionFailure, StageError,
};
pub use hydrator::{ContextHydrator, HydratedManifest, hydrate};
pub use plan::{PlannedComponent, ResolvedPlan};
pub use references::{ReferenceReport, ReferenceValidator, validate_references};
