//! `ReflowController`: the Rust-native surface an external API layer
//! (out of scope here; see the collaborator contract in the crate
//! docs) would call to start, stop, and reset a run. Every method is a
//! thin translation to shared-bus writes and a supervisor spawn; there
//! is no business logic here beyond what the bus's ownership rules
//! already require.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use reflow_shared::{control_state, SharedBus};
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::info;

use crate::config::{MpcTuningConfig, SupervisorConfig};
use crate::data_model::{ControlState, ReflowCurve};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("a reflow run is already active")]
    Busy,
}

pub struct ReflowController {
    bus: Arc<SharedBus>,
    bus_path: PathBuf,
    supervisor_binary: PathBuf,
    supervisor: SupervisorConfig,
    mpc: MpcTuningConfig,
    supervisor_tx: mpsc::Sender<Child>,
}

impl ReflowController {
    pub fn new(
        bus: Arc<SharedBus>,
        bus_path: PathBuf,
        supervisor_binary: PathBuf,
        supervisor: SupervisorConfig,
        mpc: MpcTuningConfig,
        supervisor_tx: mpsc::Sender<Child>,
    ) -> Self {
        Self {
            bus,
            bus_path,
            supervisor_binary,
            supervisor,
            mpc,
            supervisor_tx,
        }
    }

    /// Starts a new run against `curve_path`. Fails fast if a run is
    /// already active, or if the curve fails validation -- a rejected
    /// curve never reaches the bus or the supervisor. Writes
    /// `control_state = PREPARING` before the child is spawned, so no
    /// external reader ever observes an intermediate IDLE between this
    /// call and PREPARING.
    pub async fn start(&self, curve_path: &Path) -> Result<()> {
        let current = ControlState::from_bus_value(self.bus.control_state());
        if !matches!(
            current,
            ControlState::Idle | ControlState::Complete | ControlState::Cancelled | ControlState::Fault
        ) {
            return Err(ControllerError::Busy.into());
        }

        let curve_json = tokio::fs::read_to_string(curve_path)
            .await
            .with_context(|| format!("reading curve file {:?}", curve_path))?;
        let curve: ReflowCurve =
            serde_json::from_str(&curve_json).context("parsing curve JSON")?;
        curve.validate().context("validating curve")?;

        self.bus.set_should_exit(false);
        self.bus.set_cancel_run(false);
        self.bus.set_control_state(control_state::PREPARING);

        let child = Command::new(&self.supervisor_binary)
            .arg("--bus")
            .arg(&self.bus_path)
            .arg("--curve")
            .arg(curve_path)
            .arg("--new-run-threshold-temperature")
            .arg(self.supervisor.new_run_threshold_temperature.to_string())
            .arg("--settle-time-s")
            .arg(self.supervisor.settle_time_s.to_string())
            .arg("--preheat-time-s")
            .arg(self.supervisor.preheat_time_s.to_string())
            .arg("--preheat-max-temperature")
            .arg(self.supervisor.preheat_max_temperature.to_string())
            .arg("--mpc-horizon")
            .arg(self.mpc.horizon.to_string())
            .arg("--mpc-p-t")
            .arg(self.mpc.p_t.to_string())
            .arg("--mpc-p-u")
            .arg(self.mpc.p_u.to_string())
            .arg("--mpc-r-u")
            .arg(self.mpc.r_u.to_string())
            .spawn()
            .context("spawning reflow-supervisor")?;

        info!(curve = ?curve_path, "Started reflow run");
        self.supervisor_tx
            .send(child)
            .await
            .context("handing supervisor process to the monitor")?;
        Ok(())
    }

    /// Requests cancellation of the active run. A no-op while IDLE. Only
    /// sets `cancel_run`, which the supervisor alone observes and clears;
    /// writing `control_state`/`desired_oven_state` here would race the
    /// supervisor's own single-writer ownership of those cells, and
    /// reusing `should_exit` for this would also tear down the TMS link
    /// and Monitor, which key off that flag for process-lifetime
    /// shutdown. Returns immediately without waiting for the supervisor
    /// to observe the request or exit.
    pub fn stop(&self) {
        if ControlState::from_bus_value(self.bus.control_state()) == ControlState::Idle {
            return;
        }

        self.bus.set_cancel_run(true);
        info!("Cancellation requested by stop()");
    }

    /// Requests a hardware reset of the TMS. Cleared by the TMS link
    /// once the reset pulse has fired.
    pub fn request_reset(&self) {
        self.bus.set_should_reset(true);
    }
}
