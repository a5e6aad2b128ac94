//! Capabilities: typed facts a component exposes for others to bind to.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static CAPABILITY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9-]*:[a-zA-Z][a-zA-Z0-9-]*$").expect("capability pattern is valid")
});

/// Returns true for names of the form `category:type`.
pub fn is_valid_capability_name(name: &str) -> bool {
    CAPABILITY_NAME.is_match(name)
}

/// Split `category:type` into its parts.
pub fn split_capability(name: &str) -> Option<(&str, &str)> {
    is_valid_capability_name(name)
        .then(|| name.split_once(':'))
        .flatten()
}

/// A capability a component type promises to provide once synthesized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDeclaration {
    /// `category:type`, e.g. `db:postgres`.
    pub name: String,
    /// Attribute names the provided data will carry (`host`, `port`, ...).
    pub data_shape: Vec<String>,
}

impl CapabilityDeclaration {
    pub fn new(name: impl Into<String>, data_shape: &[&str]) -> Self {
        Self {
            name: name.into(),
            data_shape: data_shape.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.data_shape.iter().any(|a| a == attribute)
    }
}

/// Capability data provided by synthesized components:
/// component name → capability name → data object.
pub type ProvidedCapabilities = BTreeMap<String, BTreeMap<String, Value>>;
