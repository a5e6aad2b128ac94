//! Binder strategy registry.
//!
//! Strategies are registered once at startup. [`BinderRegistryBuilder::build`]
//! cross-checks every strategy registered for the same capability: if two of
//! them accept the same source type, the registry refuses to build. Source
//! types checked are those named by any matrix, those passed to
//! [`BinderRegistryBuilder::with_source_types`], and [`UNLISTED_SOURCE_TYPE`],
//! which catches strategies that accept arbitrary types.
//!
//! A strategy may still claim a type nobody checked. [`BinderRegistry::find`]
//! therefore reports a conflict instead of picking one of several claimers.

use crate::error::BinderRegistryError;
use crate::strategy::{BinderStrategy, CompatibilityEntry};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use stratum_core::is_valid_capability_name;

/// Checked at build time in addition to the known source types. Built-in
/// component types are kebab-case, so none collides with it.
pub const UNLISTED_SOURCE_TYPE: &str = "*";

/// Read-only table of binder strategies keyed by capability name.
#[derive(Clone, Default)]
pub struct BinderRegistry {
    strategies: BTreeMap<String, Vec<Arc<dyn BinderStrategy>>>,
}

impl std::fmt::Debug for BinderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: BTreeMap<&str, Vec<&str>> = self
            .strategies
            .iter()
            .map(|(capability, list)| (capability.as_str(), list.iter().map(|s| s.name()).collect()))
            .collect();
        f.debug_struct("BinderRegistry")
            .field("strategies", &names)
            .finish()
    }
}

impl BinderRegistry {
    pub fn builder() -> BinderRegistryBuilder {
        BinderRegistryBuilder::default()
    }

    /// The strategy serving `source_type` binding to `capability`.
    ///
    /// Fails with [`BinderRegistryError::Conflict`] when more than one
    /// strategy claims the pair.
    pub fn find(
        &self,
        source_type: &str,
        capability: &str,
    ) -> Result<Option<&Arc<dyn BinderStrategy>>, BinderRegistryError> {
        let Some(list) = self.strategies.get(capability) else {
            return Ok(None);
        };
        let claiming: Vec<&Arc<dyn BinderStrategy>> = list
            .iter()
            .filter(|strategy| strategy.can_handle(source_type, capability))
            .collect();
        match claiming.as_slice() {
            [] => Ok(None),
            [strategy] => Ok(Some(*strategy)),
            _ => Err(BinderRegistryError::Conflict {
                capability: capability.to_string(),
                source_type: source_type.to_string(),
                strategies: claiming.iter().map(|s| s.name().to_string()).collect(),
            }),
        }
    }

    /// Capability names with at least one strategy, sorted.
    pub fn capabilities(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }

    /// Every supported combination, sorted by capability then source type.
    pub fn compatibility_matrix(&self) -> Vec<CompatibilityEntry> {
        let mut entries: Vec<CompatibilityEntry> = self
            .strategies
            .values()
            .flatten()
            .flat_map(|strategy| strategy.compatibility_matrix())
            .collect();
        entries.sort_by(|a, b| {
            (a.capability.as_str(), a.source_type.as_str())
                .cmp(&(b.capability.as_str(), b.source_type.as_str()))
        });
        entries
    }

    pub fn len(&self) -> usize {
        self.strategies.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// Collects strategies and validates them on [`BinderRegistryBuilder::build`].
#[derive(Default)]
pub struct BinderRegistryBuilder {
    strategies: Vec<Arc<dyn BinderStrategy>>,
    source_types: BTreeSet<String>,
}

impl BinderRegistryBuilder {
    pub fn register(mut self, strategy: Arc<dyn BinderStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Additional source types to check for conflicts (typically every
    /// registered component type). Types listed in any compatibility matrix
    /// and [`UNLISTED_SOURCE_TYPE`] are always checked.
    pub fn with_source_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_types.extend(types.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<BinderRegistry, BinderRegistryError> {
        let mut candidates = self.source_types;
        candidates.insert(UNLISTED_SOURCE_TYPE.to_string());
        let mut strategies: BTreeMap<String, Vec<Arc<dyn BinderStrategy>>> = BTreeMap::new();

        for strategy in self.strategies {
            let capability = strategy.capability();
            if !is_valid_capability_name(capability) {
                return Err(BinderRegistryError::InvalidCapability {
                    strategy: strategy.name().to_string(),
                    capability: capability.to_string(),
                });
            }
            for entry in strategy.compatibility_matrix() {
                if entry.capability != capability {
                    return Err(BinderRegistryError::MatrixMismatch {
                        strategy: strategy.name().to_string(),
                        capability: capability.to_string(),
                        listed: entry.capability,
                    });
                }
                candidates.insert(entry.source_type);
            }
            strategies
                .entry(capability.to_string())
                .or_default()
                .push(strategy);
        }

        for (capability, list) in &strategies {
            if list.len() < 2 {
                continue;
            }
            for source_type in &candidates {
                let claiming: Vec<String> = list
                    .iter()
                    .filter(|s| s.can_handle(source_type, capability))
                    .map(|s| s.name().to_string())
                    .collect();
                if claiming.len() > 1 {
                    return Err(BinderRegistryError::Conflict {
                        capability: capability.clone(),
                        source_type: source_type.clone(),
                        strategies: claiming,
                    });
                }
            }
        }

        for (capability, list) in &strategies {
            for strategy in list {
                tracing::debug!(
                    capability = %capability,
                    strategy = strategy.name(),
                    "Registered binder strategy"
                );
            }
        }

        Ok(BinderRegistry { strategies })
    }
}
