//! Component type registration.
//!
//! Every component type contributes a [`ComponentDefinition`]: its
//! configuration schema, the layers it feeds into the configuration
//! precedence chain, the capabilities it declares, and a normalizer that
//! fills computed fields and checks cross-field invariants.
//!
//! The [`ComponentRegistry`] is built once at startup and is read-only
//! afterwards.

use crate::capability::{CapabilityDeclaration, is_valid_capability_name};
use crate::context::{ComplianceFramework, ComponentContext};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Inputs available to a normalizer.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub context: &'a ComponentContext,
    pub component_name: &'a str,
}

impl NormalizeContext<'_> {
    /// `serviceName-componentName`, the default physical name of a resource.
    pub fn default_resource_name(&self) -> String {
        format!("{}-{}", self.context.service_name, self.component_name)
    }
}

/// A cross-field invariant violated by a merged configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct NormalizeError {
    /// Dotted path inside the component config.
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl NormalizeError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Contract a component type registers with the platform.
pub trait ComponentDefinition: Send + Sync {
    /// Registry key, e.g. `lambda-api`.
    fn type_name(&self) -> &'static str;

    fn description(&self) -> &'static str {
        ""
    }

    /// JSON Schema (text) for the component's `config` object.
    fn config_schema(&self) -> &'static str;

    /// Minimal configuration that satisfies the schema with no other input.
    fn hardcoded_fallbacks(&self) -> Value;

    /// Platform-wide defaults for this type.
    fn platform_defaults(&self) -> Value {
        Value::Object(Map::new())
    }

    /// Static overlay for a compliance framework.
    fn compliance_overlay(&self, framework: ComplianceFramework) -> Value;

    /// Values a framework forces regardless of component overrides.
    fn policy_mandates(&self, _framework: ComplianceFramework) -> Value {
        Value::Object(Map::new())
    }

    /// Capabilities every instance of this type provides.
    fn declared_capabilities(&self) -> Vec<CapabilityDeclaration>;

    /// Fill computed fields and validate cross-field invariants.
    fn normalize(
        &self,
        config: &mut Map<String, Value>,
        ctx: &NormalizeContext<'_>,
    ) -> Result<(), NormalizeError>;
}

/// Error type for registry construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("component type '{0}' is registered more than once")]
    DuplicateType(String),

    #[error("component type '{component_type}' declares invalid capability name '{capability}' (expected 'category:type')")]
    InvalidCapability {
        component_type: String,
        capability: String,
    },

    #[error("component type '{component_type}' has an unparseable config schema: {reason}")]
    InvalidSchema {
        component_type: String,
        reason: String,
    },
}

/// Read-only table of component definitions keyed by type name.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    definitions: BTreeMap<&'static str, Arc<dyn ComponentDefinition>>,
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

impl ComponentRegistry {
    pub fn builder() -> ComponentRegistryBuilder {
        ComponentRegistryBuilder::default()
    }

    pub fn get(&self, component_type: &str) -> Option<&Arc<dyn ComponentDefinition>> {
        self.definitions.get(component_type)
    }

    pub fn contains(&self, component_type: &str) -> bool {
        self.definitions.contains_key(component_type)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&'static str> {
        self.definitions.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ComponentDefinition>> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Collects definitions and validates them on [`ComponentRegistryBuilder::build`].
#[derive(Default)]
pub struct ComponentRegistryBuilder {
    definitions: Vec<Arc<dyn ComponentDefinition>>,
}

impl ComponentRegistryBuilder {
    pub fn register(mut self, definition: Arc<dyn ComponentDefinition>) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn build(self) -> Result<ComponentRegistry, RegistryError> {
        let mut definitions: BTreeMap<&'static str, Arc<dyn ComponentDefinition>> = BTreeMap::new();

        for definition in self.definitions {
            let type_name = definition.type_name();

            if let Err(e) = serde_json::from_str::<Value>(definition.config_schema()) {
                return Err(RegistryError::InvalidSchema {
                    component_type: type_name.to_string(),
                    reason: e.to_string(),
                });
            }

            for capability in definition.declared_capabilities() {
                if !is_valid_capability_name(&capability.name) {
                    return Err(RegistryError::InvalidCapability {
                        component_type: type_name.to_string(),
                        capability: capability.name,
                    });
                }
            }

            if definitions.insert(type_name, definition).is_some() {
                return Err(RegistryError::DuplicateType(type_name.to_string()));
            }
            tracing::debug!(component_type = type_name, "Registered component type");
        }

        Ok(ComponentRegistry { definitions })
    }
}
