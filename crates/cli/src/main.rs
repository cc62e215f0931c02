//! Horizontal replica evaluator CLI
//!
//! Computes the replica count a horizontal pod autoscaler would choose, from
//! gathered metrics or from a captured cluster snapshot.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::gather::GatherRequest;
use commands::{evaluate, gather, simulate, RunContext};
use evaluator_lib::Evaluator;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Horizontal replica evaluator
#[derive(Parser)]
#[command(name = "hpactl")]
#[command(author, version, about = "Evaluate horizontal pod autoscaler replica counts", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Path to a config file (defaults to ~/.config/hpactl/config.json)
    #[arg(long, global = true, env = "HPACTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Tolerance around a usage ratio of 1.0, overriding the config
    #[arg(long, global = true)]
    pub tolerance: Option<f64>,

    /// Write Prometheus metrics to this file after evaluating
    #[arg(long, global = true)]
    pub metrics_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate gathered metrics from a JSON file
    Evaluate {
        /// Gathered metrics, as written by `gather`
        #[arg(long, short)]
        input: PathBuf,

        /// Replicas currently running
        #[arg(long)]
        current_replicas: i32,
    },

    /// Gather metrics for a set of specs from a cluster snapshot
    Gather {
        #[command(flatten)]
        source: SourceArgs,

        /// Write gathered metrics to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Gather from a snapshot and evaluate the result
    Simulate {
        #[command(flatten)]
        source: SourceArgs,

        /// Replicas currently running
        #[arg(long)]
        current_replicas: i32,
    },
}

#[derive(clap::Args)]
pub struct SourceArgs {
    /// Cluster snapshot JSON file
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Metric specs JSON file (a list of autoscaling/v2 metric specs)
    #[arg(long)]
    pub specs: PathBuf,

    /// Namespace of the scaled pods (defaults to the configured namespace)
    #[arg(long, short)]
    pub namespace: Option<String>,

    /// Label selector for the scaled pods, e.g. `app=web,tier!=cache`
    #[arg(long, short = 'l', default_value = "")]
    pub selector: String,
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

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::print_error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(tolerance) = cli.tolerance {
        config.tolerance = tolerance;
        config.validate()?;
    }
    info!(tolerance = config.tolerance, namespace = %config.namespace, "Configuration loaded");

    let evaluator = Evaluator::new(config.tolerance);
    let ctx = RunContext {
        format: cli.format,
        metrics_file: cli.metrics_file,
    };

    match cli.command {
        Commands::Evaluate {
            input,
            current_replicas,
        } => evaluate::run(&evaluator, &input, current_replicas, &ctx),
        Commands::Gather { source, output } => {
            let namespace = source.namespace.as_deref().unwrap_or(config.namespace.as_str());
            let request = GatherRequest {
                snapshot: &source.snapshot,
                specs: &source.specs,
                namespace,
                selector: &source.selector,
            };
            gather::run(&request, config.gather_config(), output.as_deref()).await
        }
        Commands::Simulate {
            source,
            current_replicas,
        } => {
            let namespace = source.namespace.as_deref().unwrap_or(config.namespace.as_str());
            let request = GatherRequest {
                snapshot: &source.snapshot,
                specs: &source.specs,
                namespace,
                selector: &source.selector,
            };
            simulate::run(
                &evaluator,
                &request,
                config.gather_config(),
                current_replicas,
                &ctx,
            )
            .await
        }
    }
}
