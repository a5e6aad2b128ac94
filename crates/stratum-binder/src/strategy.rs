//! The binder strategy contract and the values strategies produce.
//!
//! A strategy turns one resolved `binds` directive into concrete operations
//! for the source component to apply: environment variables, IAM grants and
//! network rules. Strategies never mutate their inputs; the resolver hands
//! them a read-only [`BindingContext`] and collects the [`BindingResult`].

use crate::error::BindingError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use stratum_core::{AccessLevel, BindDirective, ComponentContext, DocPath};

/// A value that is either known now or filled in by the synthesizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BindingValue {
    /// Known at resolution time.
    Literal(Value),
    /// An attribute of a target capability, known only after synthesis.
    Deferred {
        component: String,
        capability: String,
        attribute: String,
    },
}

impl BindingValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        BindingValue::Literal(value.into())
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, BindingValue::Deferred { .. })
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            BindingValue::Literal(value) => Some(value),
            BindingValue::Deferred { .. } => None,
        }
    }
}

/// Permission for the source to act on a target resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub actions: Vec<String>,
    pub resource: BindingValue,
}

/// Ingress the target must allow from the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRule {
    pub port: u16,
    pub protocol: String,
    pub description: String,
}

/// Operations a binding asks the source component to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingResult {
    pub binding_id: String,
    pub source: String,
    pub source_type: String,
    pub target: String,
    pub target_type: String,
    pub capability: String,
    pub access: AccessLevel,
    #[serde(default)]
    pub environment: BTreeMap<String, BindingValue>,
    #[serde(default)]
    pub grants: Vec<AccessGrant>,
    #[serde(default)]
    pub network: Vec<NetworkRule>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    /// Name of the strategy that produced the result.
    pub strategy: String,
}

/// One (source type, capability) combination a strategy supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityEntry {
    pub source_type: String,
    pub capability: String,
    pub access: Vec<AccessLevel>,
    pub description: String,
}

impl CompatibilityEntry {
    pub fn new(
        source_type: impl Into<String>,
        capability: impl Into<String>,
        access: &[AccessLevel],
        description: impl Into<String>,
    ) -> Self {
        Self {
            source_type: source_type.into(),
            capability: capability.into(),
            access: access.to_vec(),
            description: description.into(),
        }
    }
}

/// Everything a strategy may read while binding.
#[derive(Debug, Clone, Copy)]
pub struct BindingContext<'a> {
    pub binding_id: &'a str,
    /// `root.components[i].binds[j]`.
    pub path: &'a DocPath,
    pub source: &'a str,
    pub source_type: &'a str,
    pub target: &'a str,
    pub target_type: &'a str,
    /// Final configuration of the target component.
    pub target_config: &'a Value,
    pub directive: &'a BindDirective,
    /// Capability data the target provided, when synthesized already.
    pub provided: Option<&'a Map<String, Value>>,
    pub context: &'a ComponentContext,
}

impl<'a> BindingContext<'a> {
    pub fn capability(&self) -> &'a str {
        &self.directive.capability
    }

    pub fn access(&self) -> AccessLevel {
        self.directive.access
    }

    /// A capability attribute: literal when provided data carries it,
    /// otherwise deferred to the synthesizer.
    pub fn attribute(&self, attribute: &str) -> BindingValue {
        match self.provided.and_then(|data| data.get(attribute)) {
            Some(value) => BindingValue::Literal(value.clone()),
            None => BindingValue::Deferred {
                component: self.target.to_string(),
                capability: self.directive.capability.clone(),
                attribute: attribute.to_string(),
            },
        }
    }

    /// Like [`BindingContext::attribute`], but falls back to a key of the
    /// target's resolved configuration before deferring.
    pub fn attribute_or_config(&self, attribute: &str, config_key: &str) -> BindingValue {
        if let Some(value) = self.provided.and_then(|data| data.get(attribute)) {
            return BindingValue::Literal(value.clone());
        }
        match self.target_config.get(config_key) {
            Some(value) if !value.is_null() => BindingValue::Literal(value.clone()),
            _ => self.attribute(attribute),
        }
    }

    /// Environment variable name after `customEnvVars` renaming.
    pub fn env_name(&self, default: &str) -> String {
        self.directive
            .custom_env_vars
            .get(default)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// Reject access levels outside `supported`.
    pub fn require_access(&self, supported: &[AccessLevel]) -> Result<(), BindingError> {
        if supported.contains(&self.access()) {
            Ok(())
        } else {
            Err(BindingError::access_not_supported(
                self.binding_id,
                self.path.key("access"),
                self.capability(),
                self.access(),
                supported,
            ))
        }
    }

    /// An empty result for this binding, to be filled by the strategy.
    pub fn result(&self, strategy: &str) -> BindingResult {
        BindingResult {
            binding_id: self.binding_id.to_string(),
            source: self.source.to_string(),
            source_type: self.source_type.to_string(),
            target: self.target.to_string(),
            target_type: self.target_type.to_string(),
            capability: self.directive.capability.clone(),
            access: self.access(),
            environment: BTreeMap::new(),
            grants: Vec::new(),
            network: Vec::new(),
            metadata: BTreeMap::new(),
            strategy: strategy.to_string(),
        }
    }
}

impl BindingResult {
    /// Set an environment variable, applying the directive's renaming.
    pub fn env(&mut self, ctx: &BindingContext<'_>, default_name: &str, value: BindingValue) -> &mut Self {
        self.environment.insert(ctx.env_name(default_name), value);
        self
    }

    pub fn grant(&mut self, actions: &[&str], resource: BindingValue) -> &mut Self {
        self.grants.push(AccessGrant {
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resource,
        });
        self
    }

    pub fn allow(&mut self, port: u16, protocol: &str, description: impl Into<String>) -> &mut Self {
        self.network.push(NetworkRule {
            port,
            protocol: protocol.to_string(),
            description: description.into(),
        });
        self
    }

    pub fn meta(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A binding strategy for one capability.
///
/// The registry looks strategies up by [`BinderStrategy::capability`] and
/// then asks [`BinderStrategy::can_handle`] which one serves the source type.
pub trait BinderStrategy: Send + Sync {
    /// Unique strategy name.
    fn name(&self) -> &'static str;

    /// The capability this strategy binds to.
    fn capability(&self) -> &'static str;

    /// Every supported (source type, capability, access) combination.
    fn compatibility_matrix(&self) -> Vec<CompatibilityEntry>;

    fn can_handle(&self, source_type: &str, capability: &str) -> bool {
        self.compatibility_matrix()
            .iter()
            .any(|entry| entry.source_type == source_type && entry.capability == capability)
    }

    /// Compute the binding. Must not depend on anything outside `ctx`.
    fn bind(&self, ctx: &BindingContext<'_>) -> Result<BindingResult, BindingError>;
}

/// Supported access levels for `source_type` in a matrix.
pub fn supported_access(matrix: &[CompatibilityEntry], source_type: &str) -> Vec<AccessLevel> {
    matrix
        .iter()
        .filter(|entry| entry.source_type == source_type)
        .flat_map(|entry| entry.access.iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn directive() -> BindDirective {
        BindDirective {
            to: Some("db".into()),
            select: None,
            capability: "db:postgres".into(),
            access: AccessLevel::Read,
            custom_env_vars: [("DB_HOST".to_string(), "PRIMARY_HOST".to_string())].into(),
        }
    }

    #[test]
    fn attributes_are_literal_only_when_provided() {
        let directive = directive();
        let context = ComponentContext::new("orders", "dev");
        let path = DocPath::component(0).key("binds").index(0);
        let config = json!({"port": 5432});
        let provided = json!({"host": "db.internal"}).as_object().cloned().unwrap();

        let mut ctx = BindingContext {
            binding_id: "api.binds[0]",
            path: &path,
            source: "api",
            source_type: "lambda-api",
            target: "db",
            target_type: "rds-postgres",
            target_config: &config,
            directive: &directive,
            provided: None,
            context: &context,
        };

        assert!(ctx.attribute("host").is_deferred());
        assert_eq!(ctx.attribute_or_config("port", "port"), BindingValue::literal(5432));

        ctx.provided = Some(&provided);
        assert_eq!(ctx.attribute("host"), BindingValue::literal("db.internal"));
        assert_eq!(ctx.env_name("DB_HOST"), "PRIMARY_HOST");
        assert_eq!(ctx.env_name("DB_PORT"), "DB_PORT");
    }

    #[test]
    fn binding_values_serialize_tagged() {
        let deferred = BindingValue::Deferred {
            component: "db".into(),
            capability: "db:postgres".into(),
            attribute: "host".into(),
        };
        assert_eq!(
            serde_json::to_value(&deferred).unwrap(),
            json!({"deferred": {"component": "db", "capability": "db:postgres", "attribute": "host"}})
        );
        assert_eq!(
            serde_json::to_value(BindingValue::literal(5)).unwrap(),
            json!({"literal": 5})
        );
    }
}
