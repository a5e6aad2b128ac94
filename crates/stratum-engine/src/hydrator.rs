//! Context hydration.
//!
//! Turns a schema-valid manifest into the tree the later stages consume:
//!
//! 1. each component's `environments.<env>` block is deep-merged into its
//!    `config` and the `environments` block is dropped;
//! 2. top-level `environments` blocks for other environments are dropped, so
//!    their expressions are never evaluated;
//! 3. every `${ref:component.path}` and `${env:key}` expression anywhere in
//!    the tree is replaced, depth first.
//!
//! A reference path is relative to the referenced component's merged
//! `config`. When capability data from synthesis is supplied, a path whose
//! first segment names one of the component's provided capabilities reads
//! from that data instead (`${ref:db.db:postgres.host}`).
//!
//! Referenced values that themselves contain expressions are resolved
//! recursively. Any failure aborts hydration.

use crate::error::HydrationError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use stratum_core::expr::RenderError;
use stratum_core::manifest::json_kind;
use stratum_core::{
    ConfigValue, DocPath, Expression, Manifest, ManifestDocument, ProvidedCapabilities, RefExpr,
    Template,
};

/// A manifest with environment blocks merged and every expression resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct HydratedManifest {
    pub environment: String,
    pub document: ManifestDocument,
    pub manifest: Manifest,
}

/// Hydrates manifests for one target environment.
#[derive(Debug, Clone, Copy)]
pub struct ContextHydrator<'a> {
    environment: &'a str,
    provided: Option<&'a ProvidedCapabilities>,
}

impl<'a> ContextHydrator<'a> {
    pub fn new(environment: &'a str) -> Self {
        Self {
            environment,
            provided: None,
        }
    }

    /// Resolve references against synthesized capability data as well.
    pub fn with_provided(mut self, provided: &'a ProvidedCapabilities) -> Self {
        self.provided = Some(provided);
        self
    }

    pub fn hydrate(&self, document: &ManifestDocument) -> Result<HydratedManifest, HydrationError> {
        let mut tree = document.tree().clone();
        merge_environments(&mut tree, self.environment)?;
        retain_selected_environment(&mut tree, self.environment);

        let mut resolver = Resolver {
            environment: self.environment,
            components: component_configs(&tree),
            env_defaults: env_defaults(&tree, self.environment),
            provided: self.provided,
            stack: Vec::new(),
            resolved: 0,
        };
        let tree = resolver.resolve_value(&tree, &DocPath::root())?;

        tracing::debug!(
            environment = %self.environment,
            expressions = resolver.resolved,
            "Hydrated manifest"
        );

        let document =
            ManifestDocument::from_tree(tree).map_err(|e| HydrationError::Shape(e.to_string()))?;
        let manifest =
            Manifest::from_document(&document).map_err(|e| HydrationError::Shape(e.to_string()))?;

        Ok(HydratedManifest {
            environment: self.environment.to_string(),
            document,
            manifest,
        })
    }
}

/// Hydrate `document` for `environment` without capability data.
pub fn hydrate(
    document: &ManifestDocument,
    environment: &str,
) -> Result<HydratedManifest, HydrationError> {
    ContextHydrator::new(environment).hydrate(document)
}

fn merge_environments(tree: &mut Value, environment: &str) -> Result<(), HydrationError> {
    let Some(components) = tree.get_mut("components").and_then(Value::as_array_mut) else {
        return Ok(());
    };

    for (index, component) in components.iter_mut().enumerate() {
        let Some(component) = component.as_object_mut() else {
            continue;
        };
        let path = DocPath::component(index);

        let block = match component.remove("environments") {
            None => continue,
            Some(Value::Object(mut blocks)) => match blocks.remove(environment) {
                None | Some(Value::Null) => continue,
                Some(block @ Value::Object(_)) => block,
                Some(other) => {
                    return Err(HydrationError::MergeConflict {
                        path: path.key("environments").key(environment),
                        message: format!("expected a mapping, found {}", json_kind(&other)),
                    });
                }
            },
            Some(other) => {
                return Err(HydrationError::MergeConflict {
                    path: path.key("environments"),
                    message: format!("expected a mapping, found {}", json_kind(&other)),
                });
            }
        };

        let config = component
            .remove("config")
            .unwrap_or_else(|| Value::Object(Map::new()));
        if !config.is_object() {
            return Err(HydrationError::MergeConflict {
                path: path.key("config"),
                message: format!("config must be a mapping, found {}", json_kind(&config)),
            });
        }

        let merged = ConfigValue::from(config).merge(ConfigValue::from(block));
        component.insert("config".to_string(), merged.into_json());
    }

    Ok(())
}

fn retain_selected_environment(tree: &mut Value, environment: &str) {
    if let Some(blocks) = tree.get_mut("environments").and_then(Value::as_object_mut) {
        blocks.retain(|name, _| name == environment);
    }
}

/// Component name → (index, merged config). The first declaration wins.
fn component_configs(tree: &Value) -> BTreeMap<String, (usize, Value)> {
    let mut configs = BTreeMap::new();
    let components = tree.get("components").and_then(Value::as_array);
    for (index, component) in components.into_iter().flatten().enumerate() {
        let Some(name) = component.get("name").and_then(Value::as_str) else {
            continue;
        };
        let config = component
            .get("config")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        configs.entry(name.to_string()).or_insert((index, config));
    }
    configs
}

fn env_defaults(tree: &Value, environment: &str) -> Map<String, Value> {
    tree.get("environments")
        .and_then(|envs| envs.get(environment))
        .and_then(|env| env.get("defaults"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

struct Resolver<'a> {
    environment: &'a str,
    components: BTreeMap<String, (usize, Value)>,
    env_defaults: Map<String, Value>,
    provided: Option<&'a ProvidedCapabilities>,
    /// Expressions currently being resolved, outermost first.
    stack: Vec<String>,
    resolved: usize,
}

impl Resolver<'_> {
    fn resolve_value(&mut self, value: &Value, path: &DocPath) -> Result<Value, HydrationError> {
        match value {
            Value::String(text) => self.resolve_string(text, path),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| self.resolve_value(item, &path.index(index)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, child) in map {
                    let resolved = self.resolve_value(child, &path.key(key.clone()))?;
                    out.insert(key.clone(), resolved);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_string(&mut self, text: &str, path: &DocPath) -> Result<Value, HydrationError> {
        let template = Template::parse(text).map_err(|source| HydrationError::Syntax {
            path: path.clone(),
            source,
        })?;
        if !template.has_expressions() {
            return Ok(Value::String(text.to_string()));
        }

        template
            .render(|expr| self.resolve_expression(expr, path))
            .map_err(|error| match error {
                RenderError::Resolve(inner) => inner,
                RenderError::NotEmbeddable { expression, kind } => HydrationError::NotEmbeddable {
                    path: path.clone(),
                    expression,
                    kind,
                },
            })
    }

    fn resolve_expression(
        &mut self,
        expr: &Expression,
        path: &DocPath,
    ) -> Result<Value, HydrationError> {
        let key = expr.to_string();
        if let Some(start) = self.stack.iter().position(|open| *open == key) {
            let mut chain = self.stack[start..].to_vec();
            chain.push(key);
            return Err(HydrationError::Cycle {
                path: path.clone(),
                chain,
            });
        }

        let (value, origin) = match expr {
            Expression::Ref(reference) => {
                if let Some(value) = self.provided_value(reference, &key, path)? {
                    self.resolved += 1;
                    return Ok(value);
                }
                self.config_value(reference, &key, path)?
            }
            Expression::Env(name) => {
                let Some(value) = self.env_defaults.get(name) else {
                    return Err(HydrationError::UnknownEnvKey {
                        path: path.clone(),
                        expression: key,
                        environment: self.environment.to_string(),
                    });
                };
                let origin = DocPath::root()
                    .key("environments")
                    .key(self.environment)
                    .key("defaults")
                    .key(name.clone());
                (value.clone(), origin)
            }
        };

        self.stack.push(key);
        let resolved = self.resolve_value(&value, &origin);
        self.stack.pop();
        self.resolved += 1;
        resolved
    }

    /// Capability data for `reference`, when its first path segment names a
    /// capability the component provided. Provided data is already literal.
    fn provided_value(
        &self,
        reference: &RefExpr,
        key: &str,
        path: &DocPath,
    ) -> Result<Option<Value>, HydrationError> {
        let Some(capabilities) = self.provided.and_then(|p| p.get(&reference.component)) else {
            return Ok(None);
        };
        let Some((capability, rest)) = reference.path.split_first() else {
            return Ok(None);
        };
        let Some(data) = capabilities.get(capability) else {
            return Ok(None);
        };
        lookup(data, rest)
            .cloned()
            .map(Some)
            .ok_or_else(|| HydrationError::UnresolvedPath {
                path: path.clone(),
                reference: key.to_string(),
            })
    }

    fn config_value(
        &self,
        reference: &RefExpr,
        key: &str,
        path: &DocPath,
    ) -> Result<(Value, DocPath), HydrationError> {
        let Some((index, config)) = self.components.get(&reference.component) else {
            return Err(HydrationError::UnknownComponent {
                path: path.clone(),
                reference: key.to_string(),
                component: reference.component.clone(),
            });
        };
        let value = lookup(config, &reference.path).ok_or_else(|| {
            HydrationError::UnresolvedPath {
                path: path.clone(),
                reference: key.to_string(),
            }
        })?;
        let origin = DocPath::component(*index)
            .key("config")
            .join_dotted(&reference.dotted_path());
        Ok((value.clone(), origin))
    }
}

fn lookup<'v>(value: &'v Value, path: &[String]) -> Option<&'v Value> {
    path.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
