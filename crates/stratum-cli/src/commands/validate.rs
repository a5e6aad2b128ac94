//! `stratum validate`: parse and schema-check a manifest.

use super::{RunArgs, engine, read_manifest};
use anyhow::Result;
use std::path::Path;
use stratum_core::StratumConfig;

/// Returns whether the manifest is valid.
pub async fn run(config: &StratumConfig, manifest: &Path, args: &RunArgs) -> Result<bool> {
    let text = read_manifest(manifest).await?;
    let report = engine(config)?.validate(&text);

    tracing::info!(
        manifest = %manifest.display(),
        valid = report.valid,
        errors = report.errors.len(),
        "Validated manifest"
    );

    args.emit_report(config, &report).await?;
    Ok(report.valid)
}
