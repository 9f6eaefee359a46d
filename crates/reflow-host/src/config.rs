//! Reflow Host Configuration Loader
//!
//! Parses the INI-style config file used to configure the serial link,
//! the GPIO reset line, and the MPC/supervisor tuning knobs. The plant
//! model's own constants are compile-time, per the control design; only
//! the optimizer's tuning weights and the supervisor's timing thresholds
//! are configurable here.

use anyhow::{Context, Result};
use configparser::ini::Ini;
use std::path::Path;

/// The `[serial]` section: how to reach the TMS.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
}

/// The `[gpio]` section: the hardware reset line.
#[derive(Debug, Clone)]
pub struct GpioConfig {
    pub chip: String,
    pub line: u32,
}

/// The `[mpc]` section: optimizer tuning.
#[derive(Debug, Clone)]
pub struct MpcTuningConfig {
    pub horizon: usize,
    pub p_t: f64,
    pub p_u: f64,
    pub r_u: f64,
}

/// The `[supervisor]` section: phase thresholds.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub new_run_threshold_temperature: f64,
    pub settle_time_s: u64,
    pub preheat_time_s: u64,
    pub preheat_max_temperature: f64,
    pub heartbeat_receive_threshold_ms: u64,
}

/// The entire parsed reflow host configuration.
#[derive(Debug, Clone)]
pub struct ReflowConfig {
    pub serial: SerialConfig,
    pub gpio: GpioConfig,
    pub mpc: MpcTuningConfig,
    pub supervisor: SupervisorConfig,
}

impl ReflowConfig {
    /// Loads and parses the configuration file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|e| anyhow::anyhow!(e))
            .with_context(|| format!("Failed to load configuration file: {:?}", path))?;

        let serial = SerialConfig {
            port: config
                .get("serial", "port")
                .context("[serial] port not found")?,
            baud_rate: config
                .getuint("serial", "baud")
                .context("[serial] baud not found")?
                .context("[serial] baud not found")? as u32,
        };

        let gpio = GpioConfig {
            chip: config
                .get("gpio", "chip")
                .context("[gpio] chip not found")?,
            line: config
                .getuint("gpio", "line")
                .context("[gpio] line not found")?
                .context("[gpio] line not found")? as u32,
        };

        let mpc = MpcTuningConfig {
            horizon: config
                .getuint("mpc", "horizon")
                .context("[mpc] horizon not found")?
                .context("[mpc] horizon not found")? as usize,
            p_t: config
                .getfloat("mpc", "p_t")
                .context("[mpc] p_t not found")?
                .context("[mpc] p_t not found")?,
            p_u: config
                .getfloat("mpc", "p_u")
                .context("[mpc] p_u not found")?
                .context("[mpc] p_u not found")?,
            r_u: config
                .getfloat("mpc", "r_u")
                .context("[mpc] r_u not found")?
                .context("[mpc] r_u not found")?,
        };

        let supervisor = SupervisorConfig {
            new_run_threshold_temperature: config
                .getfloat("supervisor", "new_run_threshold_temperature")
                .context("[supervisor] new_run_threshold_temperature not found")?
                .context("[supervisor] new_run_threshold_temperature not found")?,
            settle_time_s: config
                .getuint("supervisor", "settle_time_s")
                .context("[supervisor] settle_time_s not found")?
                .context("[supervisor] settle_time_s not found")?,
            preheat_time_s: config
                .getuint("supervisor", "preheat_time_s")
                .context("[supervisor] preheat_time_s not found")?
                .context("[supervisor] preheat_time_s not found")?,
            preheat_max_temperature: config
                .getfloat("supervisor", "preheat_max_temperature")
                .context("[supervisor] preheat_max_temperature not found")?
                .context("[supervisor] preheat_max_temperature not found")?,
            heartbeat_receive_threshold_ms: config
                .getuint("supervisor", "heartbeat_receive_threshold_ms")
                .context("[supervisor] heartbeat_receive_threshold_ms not found")?
                .context("[supervisor] heartbeat_receive_threshold_ms not found")?,
        };

        Ok(Self {
            serial,
            gpio,
            mpc,
            supervisor,
        })
    }

    /// The defaults named throughout the control design, used when no
    /// config file is given (e.g. `--mock-tms` local runs).
    pub fn defaults() -> Self {
        Self {
            serial: SerialConfig {
                port: "/dev/ttyUSB0".to_string(),
                baud_rate: 115_200,
            },
            gpio: GpioConfig {
                chip: "/dev/gpiochip2".to_string(),
                line: 15,
            },
            mpc: MpcTuningConfig {
                horizon: 120,
                p_t: 1e4,
                p_u: 1e-8,
                r_u: 0.01,
            },
            supervisor: SupervisorConfig {
                new_run_threshold_temperature: 45.0,
                settle_time_s: 10,
                preheat_time_s: 30,
                preheat_max_temperature: 50.0,
                heartbeat_receive_threshold_ms: 1000,
            },
        }
    }
}
