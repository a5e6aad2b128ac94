//! Layered configuration building.
//!
//! A component's final configuration is the deep merge of five layers, in
//! increasing precedence:
//!
//! | layer | source |
//! |-------|--------|
//! | hardcoded fallback | [`ComponentDefinition::hardcoded_fallbacks`] |
//! | platform defaults | [`ComponentDefinition::platform_defaults`] |
//! | environment defaults | [`ComponentDefinition::compliance_overlay`] for the run's framework |
//! | component overrides | the component's hydrated `config` |
//! | policy overrides | `governance.overrides.<name>`, then [`ComponentDefinition::policy_mandates`] |
//!
//! The merged object is normalized (computed names, correlated defaults,
//! cross-field checks) and validated against the type schema. Building is a
//! pure function of its inputs.

use crate::error::{ConfigBuildError, ConfigBuildErrorKind};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use stratum_core::manifest::json_kind;
use stratum_core::{
    ComponentContext, ComponentDefinition, ComponentSpec, ConfigValue, DocPath, NormalizeContext,
};
use stratum_schema::{SchemaCache, validate_config};

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Layer {
    HardcodedFallback,
    PlatformDefaults,
    EnvironmentDefaults,
    ComponentOverrides,
    PolicyOverrides,
    /// Filled or rewritten by the type's normalizer.
    Normalized,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::HardcodedFallback => "hardcodedFallback",
            Layer::PlatformDefaults => "platformDefaults",
            Layer::EnvironmentDefaults => "environmentDefaults",
            Layer::ComponentOverrides => "componentOverrides",
            Layer::PolicyOverrides => "policyOverrides",
            Layer::Normalized => "normalized",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resolved configuration of one component.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltConfig {
    #[serde(rename = "type")]
    pub component_type: String,
    pub config: Value,
    /// Dotted leaf path → the layer that supplied it.
    pub provenance: BTreeMap<String, Layer>,
}

/// Builds component configurations.
#[derive(Debug, Clone, Copy)]
pub struct ConfigBuilder<'a> {
    cache: &'a SchemaCache,
}

impl<'a> ConfigBuilder<'a> {
    pub fn new(cache: &'a SchemaCache) -> Self {
        Self { cache }
    }

    /// Build the final configuration of the component at `index`.
    ///
    /// `policy_override` is the component's `governance.overrides` entry.
    pub fn build(
        &self,
        context: &ComponentContext,
        index: usize,
        spec: &ComponentSpec,
        definition: &dyn ComponentDefinition,
        policy_override: Option<&Value>,
    ) -> Result<BuiltConfig, Vec<ConfigBuildError>> {
        let base_path = DocPath::component(index).key("config");
        let framework = context.compliance_framework;

        let policy = ConfigValue::from(policy_override.cloned().unwrap_or_else(empty))
            .merge(ConfigValue::from(definition.policy_mandates(framework)))
            .into_json();

        let layers = [
            (Layer::HardcodedFallback, definition.hardcoded_fallbacks(), DocPath::root()),
            (Layer::PlatformDefaults, definition.platform_defaults(), DocPath::root()),
            (
                Layer::EnvironmentDefaults,
                definition.compliance_overlay(framework),
                DocPath::root(),
            ),
            (Layer::ComponentOverrides, spec.config.clone(), base_path.clone()),
            (
                Layer::PolicyOverrides,
                policy,
                DocPath::root()
                    .key("governance")
                    .key("overrides")
                    .key(spec.name.clone()),
            ),
        ];

        let mut merged = ConfigValue::empty();
        let mut provenance = BTreeMap::new();
        for (layer, value, path) in layers {
            if !value.is_object() {
                return Err(vec![
                    ConfigBuildError::new(
                        &spec.name,
                        path,
                        ConfigBuildErrorKind::NotAnObject,
                        format!("{} layer must be a mapping, found {}", layer, json_kind(&value)),
                    )
                ]);
            }
            let value = ConfigValue::from(value);
            for leaf in value.leaf_paths() {
                provenance.insert(leaf, layer);
            }
            merged.merge_in_place(value);
        }

        let before = merged.clone();
        let mut config = match merged.into_json() {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let normalize = NormalizeContext {
            context,
            component_name: &spec.name,
        };
        definition.normalize(&mut config, &normalize).map_err(|error| {
            let suggestion = error.suggestion.clone();
            let built = ConfigBuildError::new(
                &spec.name,
                base_path.join_dotted(&error.field),
                ConfigBuildErrorKind::Normalization,
                error.message,
            );
            vec![match suggestion {
                Some(suggestion) => built.with_suggestion(suggestion),
                None => built,
            }]
        })?;

        let config = Value::Object(config);
        let after = ConfigValue::from(config.clone());
        let leaves = after.leaf_paths();
        provenance.retain(|path, _| leaves.contains(path));
        for leaf in leaves {
            if before.get_path(&leaf) != after.get_path(&leaf) {
                provenance.insert(leaf, Layer::Normalized);
            }
        }

        validate_config(self.cache, definition, &config, &base_path).map_err(|errors| {
            errors
                .into_iter()
                .map(|error| {
                    ConfigBuildError::new(
                        &spec.name,
                        error.path,
                        ConfigBuildErrorKind::Schema,
                        error.message,
                    )
                    .with_suggestion(error.suggestion)
                })
                .collect::<Vec<_>>()
        })?;

        tracing::debug!(
            component = %spec.name,
            component_type = %spec.component_type,
            framework = %framework,
            "Built component configuration"
        );

        Ok(BuiltConfig {
            component_type: spec.component_type.clone(),
            config,
            provenance,
        })
    }
}

fn empty() -> Value {
    Value::Object(Map::new())
}
