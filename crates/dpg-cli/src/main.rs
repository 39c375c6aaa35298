//! # dpg CLI entry point
//!
//! Parses command-line arguments, resolves configuration, and dispatches
//! to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dpg_cli::config::DpgConfig;
use dpg_cli::features::{run_features, FeaturesArgs};
use dpg_cli::pipeline::{run_pipeline, PipelineArgs};
use dpg_cli::types::{run_type, TypeArgs};
use dpg_cli::EXIT_ERROR;

/// dpg: build and check differentially private computation pipelines.
#[derive(Parser, Debug)]
#[command(name = "dpg", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file. Defaults to $DPG_CONFIG.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Comma-separated features to enable, replacing the configured set
    /// (contrib, floating-point, honest-but-curious).
    #[arg(long, global = true, value_name = "LIST")]
    features: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse or infer runtime type descriptors.
    Type(TypeArgs),

    /// Build a pipeline file and check, map, invoke, or calibrate it.
    Pipeline(PipelineArgs),

    /// Show enabled features.
    Features(FeaturesArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level.
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "dpg CLI starting");

    let config = match DpgConfig::load(cli.config.as_deref())
        .and_then(|c| c.with_features_override(cli.features.as_deref()))
        .context("failed to load configuration")
    {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::from(EXIT_ERROR);
        }
    };
    tracing::debug!(features = %config.features, "resolved configuration");

    let result = match cli.command {
        Commands::Type(args) => run_type(&args),
        Commands::Pipeline(args) => {
            run_pipeline(&args, &config.features, config.calibration.search_options())
        }
        Commands::Features(args) => run_features(&args, &config.features),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}
