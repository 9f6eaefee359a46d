//! Entry point for the `reflow-supervisor` binary.
//!
//! Spawned by `reflow-host` as a child process for the lifetime of one
//! run; never invoked directly by a user. Takes the bus file and curve
//! file as paths rather than inline JSON so the host's own config
//! loading stays the single source of truth for tuning.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use reflow_shared::SharedBus;
use reflow_supervisor::{Curve, SupervisorConfig};
use reflow_thermal::MpcConfig;

/// Internal CLI for one reflow run; not a user-facing command.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the shared-state bus file created by the host.
    #[arg(long)]
    bus: PathBuf,

    /// Path to the JSON-encoded reflow curve for this run.
    #[arg(long)]
    curve: PathBuf,

    #[arg(long, default_value_t = 45.0)]
    new_run_threshold_temperature: f64,
    #[arg(long, default_value_t = 10)]
    settle_time_s: u64,
    #[arg(long, default_value_t = 30)]
    preheat_time_s: u64,
    #[arg(long, default_value_t = 50.0)]
    preheat_max_temperature: f64,

    #[arg(long, default_value_t = 120)]
    mpc_horizon: usize,
    #[arg(long, default_value_t = 1e4)]
    mpc_p_t: f64,
    #[arg(long, default_value_t = 1e-8)]
    mpc_p_u: f64,
    #[arg(long, default_value_t = 0.01)]
    mpc_r_u: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let curve_json = std::fs::read_to_string(&cli.curve)
        .with_context(|| format!("reading curve file {:?}", cli.curve))?;
    let curve: Curve =
        serde_json::from_str(&curve_json).with_context(|| "parsing curve JSON")?;
    curve.validate().with_context(|| "validating curve")?;

    let bus = Arc::new(
        SharedBus::open(&cli.bus).with_context(|| format!("opening bus file {:?}", cli.bus))?,
    );

    let config = SupervisorConfig {
        new_run_threshold_temperature: cli.new_run_threshold_temperature,
        settle_time_s: cli.settle_time_s,
        preheat_time_s: cli.preheat_time_s,
        preheat_max_temperature: cli.preheat_max_temperature,
    };

    let mpc_config = MpcConfig {
        horizon: cli.mpc_horizon,
        p_t: cli.mpc_p_t,
        p_u: cli.mpc_p_u,
        r_u: cli.mpc_r_u,
        ..MpcConfig::default()
    };

    reflow_supervisor::run(bus, curve, config, mpc_config);
    Ok(())
}
