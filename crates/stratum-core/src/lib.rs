//! # stratum-core
//!
//! Shared types for the Stratum manifest resolution engine:
//!
//! - the service manifest model and its parser ([`manifest`])
//! - tagged configuration values with the layer merge rule ([`value`])
//! - reference expressions `${ref:...}` / `${env:...}` ([`expr`])
//! - component type registration ([`registry`]) and capabilities ([`capability`])
//! - collaborator interfaces for synthesis ([`collaborator`])
//! - located diagnostics ([`diagnostic`], [`path`])
//! - engine configuration loaded from `stratum.yaml` ([`config`])

pub mod cancel;
pub mod capability;
pub mod collaborator;
pub mod config;
pub mod context;
pub mod diagnostic;
pub mod expr;
pub mod manifest;
pub mod path;
pub mod registry;
pub mod value;

pub use cancel::{CancellationToken, Cancelled};
pub use capability::{CapabilityDeclaration, ProvidedCapabilities, is_valid_capability_name};
pub use collaborator::{
    CollaboratorError, Component, ComponentFactory, ResourceHandle, ResourceRequest, Synthesizer,
};
pub use config::{ConfigError, OutputFormat, StratumConfig};
pub use context::{ComplianceFramework, ComponentContext};
pub use diagnostic::{Diagnostic, Severity, ToDiagnostic, collect_all};
pub use expr::{ExprError, Expression, RefExpr, Template};
pub use manifest::{
    AccessLevel, BindDirective, BindTarget, ComponentSpec, Governance, Manifest, ManifestDocument,
    ParseError, Suppression,
};
pub use path::DocPath;
pub use registry::{
    ComponentDefinition, ComponentRegistry, NormalizeContext, NormalizeError, RegistryError,
};
pub use value::ConfigValue;
