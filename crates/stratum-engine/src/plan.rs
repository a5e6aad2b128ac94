//! The resolved plan handed to synthesis.

use crate::builder::BuiltConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use stratum_binder::BindingResult;
use stratum_core::{ComplianceFramework, Diagnostic};

/// Output of a successful run. Every map is ordered, so two runs over the
/// same inputs serialize identically.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPlan {
    pub service: String,
    pub owner: String,
    pub environment: String,
    pub compliance_framework: ComplianceFramework,
    pub region: String,
    pub account: String,
    /// Component name → final configuration.
    pub components: BTreeMap<String, PlannedComponent>,
    /// Binding id (`<source>.binds[<index>]`) → binding operations.
    pub bindings: BTreeMap<String, BindingResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Diagnostic>,
}

/// One component of a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedComponent {
    #[serde(flatten)]
    pub built: BuiltConfig,
    /// Capabilities the component's type declares.
    pub capabilities: Vec<String>,
    /// Capability data from synthesis, when the run synthesized components.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub provided: BTreeMap<String, serde_json::Value>,
}

impl ResolvedPlan {
    pub fn component(&self, name: &str) -> Option<&PlannedComponent> {
        self.components.get(name)
    }

    /// Bindings whose source is `component`, in binding-id order.
    pub fn bindings_from<'a>(&'a self, component: &'a str) -> impl Iterator<Item = &'a BindingResult> {
        self.bindings.values().filter(move |b| b.source == component)
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
