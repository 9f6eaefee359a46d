//! # Reflow Host
//!
//! Entry point for the reflow oven host process. Loads configuration,
//! creates the shared-state bus, and runs the TMS link and Monitor for
//! the life of the process, exposing [`controller::ReflowController`]
//! as the Rust-native surface an external API layer would drive
//! `start`/`stop`/`reset` through.
//!
//! ## Responsibilities
//!
//! *   Own the shared-state bus and its backing file.
//! *   Maintain the serial link to the oven's TMS microcontroller.
//! *   Spawn the reflow supervisor as a child process per run and
//!     reap it on exit.
//! *   Publish status/telemetry/log events for whatever embeds this
//!     process.
//!
//! ## Concurrency
//!
//! Two long-lived tasks run for the life of the process: the TMS link
//! and the Monitor. The reflow supervisor itself is not a task here --
//! it is a genuine child OS process, spawned and reaped by
//! [`controller::ReflowController`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reflow_host::config::ReflowConfig;
use reflow_host::controller::ReflowController;
use reflow_host::{monitor, tms_link};
use reflow_shared::SharedBus;
use tokio::sync::mpsc;
use tracing::info;

/// A Rust-based host process for a reflow soldering oven.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the reflow host process.
    Run(RunArgs),
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the reflow host configuration file.
    #[arg(short, long, default_value = "reflow.cfg")]
    config: PathBuf,

    /// Fall back to built-in defaults if the config file is missing,
    /// for local development without a real TMS attached.
    #[arg(long)]
    mock_tms: bool,

    /// Path to the `reflow-supervisor` binary to spawn per run.
    #[arg(long, default_value = "reflow-supervisor")]
    supervisor_binary: PathBuf,

    /// Path to the shared-state bus file. Defaults to a fresh
    /// temp-directory path per invocation.
    #[arg(long)]
    bus_path: Option<PathBuf>,

    /// A reflow curve to run immediately on startup. With no HTTP
    /// layer wired into this core, this is how the host is exercised
    /// standalone; an embedding process would call
    /// `ReflowController::start` directly instead.
    #[arg(long)]
    curve: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_host(args).await,
    }
}

/// Initializes and runs all the host's components as concurrent tasks.
async fn run_host(args: RunArgs) -> Result<()> {
    info!("Starting reflow host");

    let config = if args.mock_tms && !args.config.exists() {
        info!(path = ?args.config, "No config file found; using built-in defaults for a mock-TMS run");
        ReflowConfig::defaults()
    } else {
        ReflowConfig::load(&args.config)?
    };

    let bus_path = args
        .bus_path
        .unwrap_or_else(|| reflow_shared::default_bus_path(&uuid::Uuid::new_v4().to_string()));
    info!(path = ?bus_path, "Creating shared-state bus");
    let bus = Arc::new(SharedBus::create(&bus_path).context("creating shared-state bus")?);

    let (supervisor_tx, supervisor_rx) = mpsc::channel(1);
    let (events_tx, events_rx) = mpsc::channel(64);
    let channels = Arc::new(monitor::MonitorChannels::new(64));

    let controller = Arc::new(ReflowController::new(
        bus.clone(),
        bus_path.clone(),
        args.supervisor_binary.clone(),
        config.supervisor.clone(),
        config.mpc.clone(),
        supervisor_tx,
    ));

    let link_handle = tokio::spawn(tms_link::run(
        config.serial.clone(),
        config.gpio.clone(),
        config.supervisor.heartbeat_receive_threshold_ms,
        bus.clone(),
        events_tx,
    ));

    let monitor_handle = tokio::spawn(monitor::run(
        bus.clone(),
        supervisor_rx,
        events_rx,
        channels,
    ));

    if let Some(curve_path) = args.curve {
        controller
            .start(&curve_path)
            .await
            .context("starting reflow run")?;
    }

    tokio::signal::ctrl_c().await.context("waiting for ctrl_c")?;
    info!("Shutdown signal received. Exiting.");

    bus.set_should_exit(true);
    let _ = link_handle.await;
    let _ = monitor_handle.await;

    let _ = std::fs::remove_file(&bus_path);
    Ok(())
}
