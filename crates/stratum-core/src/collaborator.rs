//! Interfaces of the collaborators the engine hands off to.
//!
//! Concrete implementations (cloud SDK calls, construct trees) live outside
//! this workspace. The engine only needs to create components from resolved
//! configuration, let them synthesize, and read back the capability data they
//! provide.

use crate::context::ComponentContext;
use crate::manifest::ComponentSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors reported by collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("no factory registered for component type '{0}'")]
    UnsupportedType(String),

    #[error("failed to create component '{component}': {reason}")]
    Create { component: String, reason: String },

    #[error("synthesis of component '{component}' failed: {reason}")]
    Synthesis { component: String, reason: String },
}

/// Opaque handle to an externally materialized resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceHandle(pub String);

/// A request to materialize one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequest {
    pub logical_id: String,
    pub resource_type: String,
    pub properties: Value,
}

/// Materializes infrastructure on behalf of components.
pub trait Synthesizer {
    fn materialize(&mut self, request: ResourceRequest) -> Result<ResourceHandle, CollaboratorError>;
}

/// A component instance created from resolved configuration.
pub trait Component {
    fn name(&self) -> &str;

    /// Materialize the component's resources.
    fn synthesize(&mut self, synthesizer: &mut dyn Synthesizer) -> Result<(), CollaboratorError>;

    /// Provided capability data, keyed by capability name. Empty until
    /// synthesized.
    fn capabilities(&self) -> BTreeMap<String, Value>;

    /// Look up a materialized resource by its construct handle name.
    fn construct(&self, handle: &str) -> Option<ResourceHandle>;
}

/// Creates component instances.
pub trait ComponentFactory {
    /// `config` is the fully resolved configuration for `spec`.
    fn create(
        &self,
        spec: &ComponentSpec,
        config: &Value,
        context: &ComponentContext,
    ) -> Result<Box<dyn Component>, CollaboratorError>;
}
