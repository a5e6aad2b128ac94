//! CLI command implementations for the `stratum` binary.

pub mod capabilities;
pub mod components;
pub mod plan;
pub mod validate;

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stratum_core::{ComplianceFramework, ComponentContext, OutputFormat, StratumConfig};
use stratum_engine::ResolverEngine;
use stratum_schema::{SchemaCache, SchemaSource, ValidationResult};

/// Flags shared by every command. Each one overrides the matching
/// `stratum.yaml` setting.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Target environment, e.g. dev or prod
    #[arg(long = "env", env = "STRATUM_ENV")]
    pub environment: Option<String>,

    /// Compliance framework: commercial, fedramp-moderate or fedramp-high
    #[arg(long, env = "STRATUM_COMPLIANCE")]
    pub compliance: Option<ComplianceFramework>,

    /// Deployment region
    #[arg(long, env = "STRATUM_REGION")]
    pub region: Option<String>,

    /// Deployment account id
    #[arg(long, env = "STRATUM_ACCOUNT")]
    pub account: Option<String>,

    /// Report format: human or json
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// Write the report to a file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl RunArgs {
    /// Context for a run of `service_name`: the config file's defaults with
    /// command-line overrides applied.
    pub fn context(&self, config: &StratumConfig, service_name: &str) -> ComponentContext {
        let mut context = config.context_for(service_name);
        if let Some(environment) = &self.environment {
            context.environment = environment.clone();
        }
        if let Some(framework) = self.compliance {
            context.compliance_framework = framework;
        }
        if let Some(region) = &self.region {
            context.region = region.clone();
        }
        if let Some(account) = &self.account {
            context.account = account.clone();
        }
        context
    }

    pub fn format(&self, config: &StratumConfig) -> OutputFormat {
        self.format.unwrap_or(config.output.format)
    }

    /// Print `text`, or write it to `--output`.
    pub async fn emit(&self, text: &str) -> Result<()> {
        match &self.output {
            Some(path) => {
                tokio::fs::write(path, format!("{}\n", text.trim_end()))
                    .await
                    .with_context(|| format!("Failed to write report to {:?}", path))?;
                tracing::info!(path = %path.display(), "Report written");
            }
            None => println!("{}", text.trim_end()),
        }
        Ok(())
    }

    /// Render a validation report in the selected format and emit it.
    pub async fn emit_report(&self, config: &StratumConfig, report: &ValidationResult) -> Result<()> {
        let text = match self.format(config) {
            OutputFormat::Human => report.render_human(),
            OutputFormat::Json => report
                .render_json()
                .context("Failed to serialize validation report")?,
        };
        self.emit(&text).await
    }

    pub fn framework(&self, config: &StratumConfig) -> ComplianceFramework {
        self.compliance
            .unwrap_or(config.defaults.compliance_framework)
    }
}

/// Build an engine over the built-in component types and binder strategies.
pub fn engine(config: &StratumConfig) -> Result<ResolverEngine> {
    let components = stratum_catalog::builtin_registry()
        .context("Failed to initialize the component registry")?;
    let binders = stratum_binder::builtin_registry(components.type_names())
        .context("Failed to initialize the binder registry")?;

    let source = match &config.schema_dir {
        Some(dir) => SchemaSource::Directory(dir.clone()),
        None => SchemaSource::Embedded,
    };
    tracing::debug!(
        component_types = components.len(),
        strategies = binders.len(),
        schema_source = ?source,
        "Engine initialized"
    );

    Ok(ResolverEngine::new(
        Arc::new(components),
        Arc::new(binders),
        Arc::new(SchemaCache::new(source)),
    ))
}

pub async fn read_manifest(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read manifest: {:?}", path))
}
