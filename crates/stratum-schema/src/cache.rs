//! Schema cache.
//!
//! Loading and compiling schemas is the only expensive, repeated work in a
//! resolution run. [`SchemaCache`] keeps the base schema, composed manifest
//! validators (one per distinct set of component types) and per-type config
//! validators for as long as the cache object lives. It is passed by
//! reference to the stages that need it; [`SchemaCache::reset_cache`] drops
//! everything so the next lookup reloads from source.
//!
//! A cache instance serves a single [`ComponentRegistry`].

use crate::compose::{compose, embeddable_config_schema};
use crate::error::SchemaLoadError;
use jsonschema::Validator;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use stratum_core::{ComponentDefinition, ComponentRegistry};

/// File name of the base schema inside a schema directory.
pub const BASE_SCHEMA_FILE: &str = "manifest.schema.json";

const EMBEDDED_BASE_SCHEMA: &str = include_str!("../schemas/manifest.schema.json");

/// Where the base schema comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    /// Compiled into the binary.
    Embedded,
    /// `<dir>/manifest.schema.json`.
    Directory(PathBuf),
}

/// A composed manifest schema together with its compiled validator.
pub struct ComposedSchema {
    pub schema: Value,
    pub validator: Validator,
}

/// Cache of loaded and compiled schemas.
pub struct SchemaCache {
    source: SchemaSource,
    base: RwLock<Option<Arc<Value>>>,
    composed: RwLock<HashMap<BTreeSet<String>, Arc<ComposedSchema>>>,
    components: RwLock<HashMap<String, Arc<Validator>>>,
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(SchemaSource::Embedded)
    }
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl SchemaCache {
    pub fn new(source: SchemaSource) -> Self {
        Self {
            source,
            base: RwLock::new(None),
            composed: RwLock::new(HashMap::new()),
            components: RwLock::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &SchemaSource {
        &self.source
    }

    /// The base manifest schema, loaded on first use.
    pub fn get_base_schema(&self) -> Result<Arc<Value>, SchemaLoadError> {
        if let Some(base) = read(&self.base).as_ref() {
            return Ok(Arc::clone(base));
        }

        let loaded = Arc::new(self.load_base()?);
        let mut slot = write(&self.base);
        // Another caller may have loaded it in the meantime; keep the first.
        let base = slot.get_or_insert_with(|| Arc::clone(&loaded));
        Ok(Arc::clone(base))
    }

    /// Composed manifest schema for a set of component types.
    pub fn composed(
        &self,
        registry: &ComponentRegistry,
        types: &BTreeSet<String>,
    ) -> Result<Arc<ComposedSchema>, SchemaLoadError> {
        if let Some(entry) = read(&self.composed).get(types) {
            return Ok(Arc::clone(entry));
        }

        let base = self.get_base_schema()?;
        let schema = compose(&base, registry, types)?;
        let validator = compile("manifest", &schema)?;
        let entry = Arc::new(ComposedSchema { schema, validator });

        tracing::debug!(types = ?types, "Compiled composed manifest schema");
        let mut composed = write(&self.composed);
        let entry = composed.entry(types.clone()).or_insert(entry);
        Ok(Arc::clone(entry))
    }

    /// Compiled validator for a component type's config schema.
    pub fn component_validator(
        &self,
        definition: &dyn ComponentDefinition,
    ) -> Result<Arc<Validator>, SchemaLoadError> {
        let type_name = definition.type_name();
        if let Some(validator) = read(&self.components).get(type_name) {
            return Ok(Arc::clone(validator));
        }

        let schema = embeddable_config_schema(type_name, definition.config_schema())?;
        let validator = Arc::new(compile(type_name, &schema)?);

        let mut components = write(&self.components);
        let validator = components
            .entry(type_name.to_string())
            .or_insert(validator);
        Ok(Arc::clone(validator))
    }

    /// Drop every cached schema. Idempotent.
    pub fn reset_cache(&self) {
        *write(&self.base) = None;
        write(&self.composed).clear();
        write(&self.components).clear();
        tracing::debug!("Schema cache reset");
    }

    fn load_base(&self) -> Result<Value, SchemaLoadError> {
        let (name, content) = match &self.source {
            SchemaSource::Embedded => (BASE_SCHEMA_FILE.to_string(), EMBEDDED_BASE_SCHEMA.to_string()),
            SchemaSource::Directory(dir) => {
                let path = dir.join(BASE_SCHEMA_FILE);
                let content = fs::read_to_string(&path)
                    .map_err(|source| SchemaLoadError::Io { path: path.clone(), source })?;
                (path.display().to_string(), content)
            }
        };
        tracing::debug!(schema = %name, "Loading base manifest schema");
        serde_json::from_str(&content).map_err(|source| SchemaLoadError::Json { name, source })
    }
}

fn compile(name: &str, schema: &Value) -> Result<Validator, SchemaLoadError> {
    jsonschema::validator_for(schema).map_err(|e| SchemaLoadError::Compile {
        name: name.to_string(),
        message: e.to_string(),
    })
}

// A poisoned lock only means another thread panicked mid-insert; the maps
// are still structurally valid.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
