use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use stratum_core::StratumConfig;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::RunArgs;

#[derive(Parser, Debug)]
#[command(name = "stratum", version, about = "Resolve service manifests into deployment plans")]
struct Cli {
    /// Engine configuration file. Missing files fall back to built-in defaults.
    #[arg(long, global = true, env = "STRATUM_CONFIG", default_value = "stratum.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a manifest and check it against the composed schema.
    Validate {
        /// Path to the service manifest (YAML)
        manifest: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Resolve a manifest into a plan: hydrate, validate references, build
    /// component configuration and resolve bindings.
    Plan {
        /// Path to the service manifest (YAML)
        manifest: PathBuf,

        #[command(flatten)]
        run: RunArgs,

        /// Capability data from an earlier synthesis (JSON, component → capability → data)
        #[arg(long)]
        provided: Option<PathBuf>,
    },

    /// Show the compatibility matrix of every registered binder strategy.
    Capabilities {
        #[command(flatten)]
        run: RunArgs,
    },

    /// List registered component types, or describe one type's layers.
    Components {
        /// Component type to describe
        component_type: Option<String>,

        #[command(flatten)]
        run: RunArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let passed = match cli.cmd {
        Command::Validate { manifest, run } => {
            commands::validate::run(&config, &manifest, &run).await?
        }
        Command::Plan {
            manifest,
            run,
            provided,
        } => commands::plan::run(&config, &manifest, &run, provided.as_deref()).await?,
        Command::Capabilities { run } => commands::capabilities::run(&config, &run).await?,
        Command::Components {
            component_type,
            run,
        } => commands::components::run(&config, component_type.as_deref(), &run).await?,
    };

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn load_config(path: &Path) -> anyhow::Result<StratumConfig> {
    if !path.exists() {
        return Ok(StratumConfig::default());
    }
    StratumConfig::load_with_context(path)
        .with_context(|| format!("Failed to load configuration from {:?}", path))
}
