//! Medical Cost Estimator CLI
//!
//! A command-line tool for training the cost model, inspecting stored
//! artifacts, and producing cost estimates.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::{inspect, predict, train};
use medcost_lib::{EstimatorMetrics, ModelKind, StructuredLogger};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Medical Cost Estimator CLI
#[derive(Parser)]
#[command(name = "medcost")]
#[command(author, version, about = "CLI for the Medical Cost Estimator", long_about = None)]
pub struct Cli {
    /// Config file (defaults to ~/.config/medcost/config.toml)
    #[arg(long, env = "MEDCOST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose logging
    #[arg(long, short)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Dump Prometheus metrics after the command finishes
    #[arg(long)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train candidate models and persist the served one
    Train(TrainArgs),

    /// Compare candidate models without writing an artifact
    Evaluate {
        /// Labeled CSV dataset
        #[arg(long)]
        dataset: Option<PathBuf>,
    },

    /// Estimate the insurance cost for one person
    Predict(PredictArgs),

    /// Show metadata of a stored model artifact
    Inspect {
        /// Artifact path
        #[arg(long)]
        artifact: Option<PathBuf>,
    },

    /// Show predictor health
    Status,
}

#[derive(Args)]
pub struct TrainArgs {
    /// Labeled CSV dataset
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// Where to write the trained artifact
    #[arg(long)]
    pub artifact: Option<PathBuf>,

    /// Train on raw age and bmi instead of standardized columns
    #[arg(long)]
    pub no_standardize: bool,

    /// Seed for the train/test split
    #[arg(long)]
    pub seed: Option<u64>,

    /// Fraction of rows held out for testing
    #[arg(long)]
    pub test_fraction: Option<f64>,

    /// Cross-validation folds
    #[arg(long)]
    pub folds: Option<usize>,

    /// Model to persist (linear_regression or ridge)
    #[arg(long)]
    pub serve_model: Option<ModelKind>,
}

#[derive(Args)]
pub struct PredictArgs {
    #[arg(long)]
    pub age: u32,

    /// male or female
    #[arg(long)]
    pub sex: String,

    #[arg(long)]
    pub bmi: f64,

    #[arg(long, default_value_t = 0)]
    pub children: u32,

    /// yes or no
    #[arg(long)]
    pub smoker: String,

    /// northeast, northwest, southeast or southwest
    #[arg(long)]
    pub region: String,

    /// Artifact path
    #[arg(long)]
    pub artifact: Option<PathBuf>,
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    StructuredLogger::new("cli").log_startup(env!("CARGO_PKG_VERSION"), None);
    let mut config = config::CliConfig::load(cli.config.as_deref())?;
    debug!(config = ?config, "Configuration loaded");

    match cli.command {
        Commands::Train(args) => {
            config.apply_train_overrides(&args);
            train::train(&config, cli.format)?;
        }
        Commands::Evaluate { dataset } => {
            if let Some(dataset) = dataset {
                config.dataset_path = dataset;
            }
            train::evaluate(&config, cli.format)?;
        }
        Commands::Predict(args) => {
            if let Some(artifact) = &args.artifact {
                config.artifact_path = artifact.clone();
            }
            predict::predict(&config, &args, cli.format)?;
        }
        Commands::Inspect { artifact } => {
            if let Some(artifact) = artifact {
                config.artifact_path = artifact;
            }
            inspect::inspect(&config, cli.format)?;
        }
        Commands::Status => {
            inspect::status(&config, cli.format)?;
        }
    }

    if cli.metrics {
        print!("{}", EstimatorMetrics::new().render());
    }

    Ok(())
}
