//! Engine configuration.
//!
//! Settings for the resolution engine itself (not for a service) are read
//! from `stratum.yaml`. Every field is optional; command-line flags take
//! precedence over the file.
//!
//! ```yaml
//! defaults:
//!   environment: dev
//!   complianceFramework: fedramp-moderate
//!   region: us-gov-west-1
//!   account: "123456789012"
//! tags:
//!   cost-center: platform
//! schemaDir: schemas
//! output:
//!   format: json
//! logLevel: debug
//! ```

pub mod defaults;
pub mod output;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use defaults::DefaultsConfig;
pub use output::{OutputConfig, OutputFormat};

use crate::context::ComponentContext;

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StratumConfig {
    /// Defaults for the component context.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Tags applied to every run's context.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// Directory holding `manifest.schema.json`, replacing the embedded base schema.
    #[serde(default)]
    pub schema_dir: Option<PathBuf>,

    /// Report output settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for StratumConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            tags: BTreeMap::new(),
            schema_dir: None,
            output: OutputConfig::default(),
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StratumConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration and resolve paths relative to the file's directory.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(schema_dir) = &config.schema_dir {
            let resolved = if schema_dir.is_absolute() {
                schema_dir.clone()
            } else {
                base_dir.join(schema_dir)
            };
            if !resolved.is_dir() {
                return Err(ConfigError::Config(format!(
                    "schemaDir '{}' is not a directory",
                    resolved.display()
                )));
            }
            config.schema_dir = Some(resolved);
        }

        Ok(config)
    }

    /// Build the context for a run of `service_name`.
    pub fn context_for(&self, service_name: &str) -> ComponentContext {
        let mut context = ComponentContext::new(service_name, &self.defaults.environment)
            .with_framework(self.defaults.compliance_framework)
            .with_region(&self.defaults.region)
            .with_account(&self.defaults.account);
        context.tags = self.tags.clone();
        context
    }
}
