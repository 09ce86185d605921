use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use churnwatch::config::{load_config, ChurnConfig};
use churnwatch::pipeline::{run_drift_check, run_flow, InProcessTraining, TrainingPipeline};
use churnwatch::registry::{ModelRegistry, Selector, Stage};
use churnwatch::server::{serve, PredictionService};

/// Churnwatch: train, publish, serve and monitor the telco churn model
#[derive(Parser, Debug)]
#[command(name = "churnwatch", version, about, long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./churnwatch.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train on the configured dataset and publish a new model version
    Train,
    /// Serve predictions over HTTP
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
        /// Override the configured selector (latest, a version, or a stage)
        #[arg(long)]
        selector: Option<String>,
    },
    /// Reassign the stage label of a published version
    Stage {
        version: u64,
        /// none, staging or production
        stage: String,
        /// Model name (defaults to the configured training model name)
        #[arg(long)]
        model: Option<String>,
    },
    /// Compare a current batch with the reference dataset and store the report
    Drift {
        /// CSV of the current batch; a synthetic drifted sample when omitted
        #[arg(long)]
        current: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8, json: bool) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry().with(layer.with_filter(filter)).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("command failed: {:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Train => train(config).await,
        Commands::Serve { port, selector } => serve_command(config, port, selector).await,
        Commands::Stage { version, stage, model } => stage_command(&config, version, &stage, model),
        Commands::Drift { current } => drift_command(&config, current),
    }
}

async fn train(config: ChurnConfig) -> anyhow::Result<()> {
    let registry = Arc::new(ModelRegistry::open(&config.registry.root)?);
    let task = InProcessTraining::new(TrainingPipeline::new(config, registry));
    let published = run_flow(&task).await?;
    println!("{}", serde_json::to_string_pretty(&published)?);
    Ok(())
}

async fn serve_command(mut config: ChurnConfig, port: Option<u16>, selector: Option<String>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.serve.port = port;
    }
    if let Some(selector) = selector {
        config.serve.selector = selector;
    }

    let registry = ModelRegistry::open(&config.registry.root)?;
    let selector: Selector = config.serve.selector.parse()?;
    let service = match PredictionService::load(&registry, &config.serve.model_name, &selector) {
        Ok(service) => service,
        Err(e) if !config.serve.require_model => {
            warn!(error = %e, "starting without a model");
            PredictionService::unavailable(e.to_string())
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!(
                    "failed to load model '{}' ({})",
                    config.serve.model_name, config.serve.selector
                )
            })
        }
    };

    serve(&config.serve.bind_address(), Arc::new(service)).await?;
    Ok(())
}

fn stage_command(config: &ChurnConfig, version: u64, stage: &str, model: Option<String>) -> anyhow::Result<()> {
    let stage: Stage = stage.parse()?;
    let name = model.unwrap_or_else(|| config.training.model_name.clone());
    let registry = ModelRegistry::open(&config.registry.root)?;
    registry.set_stage(&name, version, stage)?;
    println!("{} v{} -> {}", name, version, stage);
    Ok(())
}

fn drift_command(config: &ChurnConfig, current: Option<PathBuf>) -> anyhow::Result<()> {
    let report = run_drift_check(config, current.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
