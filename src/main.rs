//! sdlfsm - SDL-style process runner
//!
//! Runs a process definition against scripted signals, exports its graph, or
//! validates it.

use clap::{Parser, Subcommand};
use sdlfsm_core::{export, Host, ProcessDefinition, Signal, Value};
use sdlfsm_runtime::{FsmManager, LoggingCallback, Metrics, RuntimeConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sdlfsm")]
#[command(about = "Run, export and check SDL-style process definitions")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "SDLFSM_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a process and feed it scripted signals
    Run {
        /// Process definition (JSON)
        definition: PathBuf,

        /// Signal script: JSON list of {"name", "args", "delay_ms"}
        #[arg(short, long)]
        events: Option<PathBuf>,

        /// Seconds to wait for the process to finish after the script
        #[arg(long, default_value = "5")]
        timeout_secs: u64,

        /// Write Prometheus metrics to this file when the run ends
        #[arg(long)]
        metrics: Option<PathBuf>,
    },

    /// Print the process graph in graphviz format
    Export {
        /// Process definition (JSON)
        definition: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a definition and print its checksum
    Check {
        /// Process definition (JSON)
        definition: PathBuf,
    },
}

/// One scripted signal.
#[derive(Debug, Deserialize)]
struct ScriptedSignal {
    name: String,
    #[serde(default)]
    args: Vec<serde_json::Value>,
    /// Pause before sending.
    #[serde(default)]
    delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RuntimeConfig::from_file(path).map(|mut c| {
            c.apply_env_overrides();
            c
        }),
        None => Ok(RuntimeConfig::from_env()),
    };

    // Initialize logging (RUST_LOG wins over the configured filter)
    let filter = config
        .as_ref()
        .map(|c| c.logging.filter.clone())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = match config {
        Ok(c) => {
            if let Some(path) = &cli.config {
                tracing::info!("Loaded config from {}", path.display());
            } else {
                tracing::debug!("Using default configuration");
            }
            c
        }
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };
    config.validate()?;

    match cli.command {
        Commands::Run {
            definition,
            events,
            timeout_secs,
            metrics,
        } => {
            run(
                &config,
                &definition,
                events.as_deref(),
                timeout_secs,
                metrics.as_deref(),
            )
            .await
        }
        Commands::Export { definition, output } => {
            let definition = ProcessDefinition::from_file(&definition)?;
            let dot = export_dot(&definition)?;
            match output {
                Some(path) => std::fs::write(path, dot)?,
                None => print!("{}", dot),
            }
            Ok(())
        }
        Commands::Check { definition } => {
            let definition = ProcessDefinition::from_file(&definition)?;
            println!("{}: ok (checksum {})", definition.name, definition.checksum);
            Ok(())
        }
    }
}

async fn run(
    config: &RuntimeConfig,
    definition: &Path,
    events: Option<&Path>,
    timeout_secs: u64,
    metrics_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let definition = ProcessDefinition::from_file(definition)?;
    let script: Vec<ScriptedSignal> = match events {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => Vec::new(),
    };

    let metrics = Arc::new(Metrics::new()?);
    let callback = Arc::new(LoggingCallback::new(Arc::clone(&metrics)));
    let manager = Arc::new(FsmManager::with_metrics(
        config,
        callback,
        Arc::clone(&metrics),
    )?);
    let runner = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.run().await })
    };

    let process_id = manager.create_process(&definition)?;
    manager.start_process(process_id)?;

    for step in script {
        if step.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(step.delay_ms)).await;
        }
        let args = step
            .args
            .iter()
            .map(Value::from_json)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!("Sending {} to process {}", step.name, process_id);
        if let Err(e) = manager.send_signal(Signal::with_args(process_id, step.name, args)) {
            tracing::warn!("Script stopped: {}", e);
            break;
        }
    }

    let outcome = tokio::select! {
        outcome = manager.wait_finished(process_id, Duration::from_secs(timeout_secs)) => outcome,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
            None
        }
    };

    let report = match (&outcome, manager.snapshot(process_id)) {
        (Some(outcome), _) => serde_json::to_value(outcome)?,
        (None, Some(snapshot)) => serde_json::to_value(snapshot)?,
        (None, None) => serde_json::Value::Null,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    tracing::info!(
        "{} signal(s) emitted, {} function call(s)",
        metrics.signals_sent(),
        metrics.function_calls()
    );
    if let Some(path) = metrics_path {
        std::fs::write(path, metrics.encode()?)?;
        tracing::info!("Metrics written to {}", path.display());
    }

    manager.shutdown();
    runner.await??;
    Ok(())
}

/// Builds the process on an inert host so its graph can be rendered.
fn export_dot(definition: &ProcessDefinition) -> Result<String, Box<dyn std::error::Error>> {
    use sdlfsm_core::host::{ManualScheduler, QueueSink, RecordingCallback};

    let host = Host::new(
        Arc::new(RecordingCallback::new()),
        Arc::new(ManualScheduler::new()),
        Arc::new(QueueSink::new()),
    );
    let process = definition.instantiate(0, host)?;
    Ok(export::to_dot(&process))
}
