//! Tycoon engine binary.
//!
//! Wires configuration, logging, the HTTP bridge, the progress store, and
//! the status API around the tick loops in `tycoon-core`.
//!
//! # Commands
//!
//! - `tycoon provision` -- create the corporation and first division if
//!   absent, then exit (or continue into the engine with `--run`)
//! - `tycoon run` -- run the configured controller continuously
//! - `tycoon gang` -- run the gang controller regardless of `engine.mode`
//!
//! # Startup Sequence
//!
//! 1. Parse the command line
//! 2. Load `tycoon.yaml` (defaults if absent) and apply overrides
//! 3. Initialize structured logging (tracing)
//! 4. Build the HTTP bridge
//! 5. Start the status API if enabled
//! 6. Open the progress store and run the tick loop

mod bridge;
mod error;
mod observer_callback;
mod provision;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tycoon_core::config::{
    EngineMode, LogFormat, LoggingConfig, StoreBackend, StoreConfig, TycoonConfig,
};
use tycoon_core::runner::{self, GangCallback};
use tycoon_core::{NoOpCallback, TickCallback};
use tycoon_observer::{AppState, ServerConfig};
use tycoon_store::{DragonflyProgressStore, FileProgressStore, ProgressStore};

use crate::bridge::HttpBridge;
use crate::error::EngineError;
use crate::observer_callback::ObserverCallback;
use crate::provision::ProvisionRequest;

/// Phased progression engine for a simulated corporation.
#[derive(Debug, Parser)]
#[command(name = "tycoon", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(
        long,
        short,
        global = true,
        env = "TYCOON_CONFIG",
        default_value = "tycoon.yaml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the corporation and first division if absent.
    Provision {
        /// Corporation name, used only when creating it.
        #[arg(long, default_value = "MegaCorp")]
        corporation: String,
        /// Name of the first division.
        #[arg(long, default_value = "Agriculture")]
        division: String,
        /// Industry of the first division.
        #[arg(long, default_value = "Agriculture")]
        industry: String,
        /// Start the engine once provisioning succeeds.
        #[arg(long)]
        run: bool,
    },
    /// Run the configured controller continuously.
    Run(RunArgs),
    /// Run the gang controller loop.
    Gang(RunArgs),
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Milliseconds between ticks; overrides the config file and environment.
    #[arg(long)]
    tick_interval_ms: Option<u64>,
    /// Stop after this many ticks.
    #[arg(long)]
    max_ticks: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, loaded) = load_config(&cli.config)?;
    init_logging(&config.logging);
    if loaded {
        info!(path = %cli.config.display(), "configuration loaded");
    } else {
        info!(path = %cli.config.display(), "config file not found, using defaults");
    }

    match cli.command {
        Command::Provision {
            corporation,
            division,
            industry,
            run,
        } => {
            let mut bridge = HttpBridge::new(&config.bridge)?;
            let request = ProvisionRequest {
                corporation,
                division,
                industry,
            };
            let report = provision::provision(&mut bridge, &request).await?;
            info!(
                corporation_created = report.corporation_created,
                division_created = report.division_created,
                "provisioning complete"
            );
            if run {
                run_engine(config, &RunArgs::default(), None).await?;
            }
        }
        Command::Run(args) => run_engine(config, &args, None).await?,
        Command::Gang(args) => run_engine(config, &args, Some(EngineMode::Gang)).await?,
    }
    Ok(())
}

/// Load the configuration file, falling back to defaults if it is absent.
///
/// Returns the config and whether the file existed.
fn load_config(path: &Path) -> Result<(TycoonConfig, bool), EngineError> {
    if path.exists() {
        Ok((TycoonConfig::from_file(path)?, true))
    } else {
        Ok((TycoonConfig::parse("")?, false))
    }
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match config.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn open_store(config: &StoreConfig) -> Result<ProgressStore, EngineError> {
    Ok(match config.backend {
        StoreBackend::File => ProgressStore::File(FileProgressStore::new(config.path.clone())),
        StoreBackend::Dragonfly => ProgressStore::Dragonfly(
            DragonflyProgressStore::connect(&config.dragonfly_url, config.key.clone()).await?,
        ),
    })
}

async fn run_engine(
    mut config: TycoonConfig,
    args: &RunArgs,
    mode: Option<EngineMode>,
) -> Result<(), EngineError> {
    if let Some(tick_interval_ms) = args.tick_interval_ms {
        config.engine.tick_interval_ms = tick_interval_ms;
    }
    if let Some(max_ticks) = args.max_ticks {
        config.engine.max_ticks = max_ticks;
    }
    if let Some(mode) = mode {
        config.engine.mode = mode;
    }

    let mut bridge = HttpBridge::new(&config.bridge)?;
    info!(
        bridge = bridge.base_url(),
        tick_interval_ms = config.engine.tick_interval_ms,
        max_ticks = config.engine.max_ticks,
        "bridge client ready"
    );

    match config.engine.mode {
        EngineMode::Corporation => {
            let plan = config.resolve_plan()?;
            let observer = start_observer(&config, &plan.name, "corporation")?;
            let mut callback: Box<dyn TickCallback> = match observer {
                Some(state) => Box::new(ObserverCallback::new(state)),
                None => Box::new(NoOpCallback),
            };
            let store = open_store(&config.store).await?;

            tokio::select! {
                result = runner::run_engine(&plan, &config.engine, &store, &mut bridge, callback.as_mut()) => {
                    let summary = result?;
                    info!(
                        total_ticks = summary.total_ticks,
                        phase = summary.progress.phase,
                        sub_phase = summary.progress.sub_phase,
                        investment_round = summary.progress.investment_round,
                        "engine stopped"
                    );
                }
                _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
            }
        }
        EngineMode::Gang => {
            let observer = start_observer(&config, "gang", "gang")?;
            let mut callback: Box<dyn GangCallback> = match observer {
                Some(state) => Box::new(ObserverCallback::new(state)),
                None => Box::new(NoOpCallback),
            };

            tokio::select! {
                total_ticks = runner::run_gang_loop(&config.gang, &config.engine, &mut bridge, callback.as_mut()) => {
                    info!(total_ticks, "gang controller stopped");
                }
                _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
            }
        }
    }
    Ok(())
}

/// Spawn the status API if it is enabled.
fn start_observer(
    config: &TycoonConfig,
    plan: &str,
    mode: &str,
) -> Result<Option<Arc<AppState>>, EngineError> {
    if !config.observer.enabled {
        return Ok(None);
    }
    let state = Arc::new(AppState::new(plan, mode));
    let _server =
        tycoon_observer::spawn_server(ServerConfig::from(&config.observer), Arc::clone(&state))?;
    info!(
        host = %config.observer.host,
        port = config.observer.port,
        "status API started"
    );
    Ok(Some(state))
}
