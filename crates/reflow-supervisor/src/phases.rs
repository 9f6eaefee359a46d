//! The reflow state machine: PREPARING -> settle -> preheat -> RUNNING
//! -> COMPLETE/CANCELLED/FAULT.
//!
//! Runs synchronously in its own process: there is no I/O here beyond
//! the memory-mapped bus, so there is nothing for an async runtime to
//! multiplex. A panic anywhere in this module takes down only this
//! child process, never the host or the TMS link.

use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use reflow_shared::{control_state, oven_state, SharedBus};
use reflow_thermal::{Mpc, MpcConfig, PlantState, ReferenceTrajectory};
use tracing::{error, info, warn};

use crate::curve::Curve;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const MAX_CONSECUTIVE_SOLVER_FAILURES: u32 = 3;

/// Phase timing thresholds. The plant constants themselves are not
/// configurable here; see `reflow_thermal::plant`.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorConfig {
    pub new_run_threshold_temperature: f64,
    pub settle_time_s: u64,
    pub preheat_time_s: u64,
    pub preheat_max_temperature: f64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            new_run_threshold_temperature: 45.0,
            settle_time_s: 10,
            preheat_time_s: 30,
            preheat_max_temperature: 50.0,
        }
    }
}

enum Outcome {
    Completed,
    Cancelled,
    Faulted,
}

/// Drives one reflow run to a terminal `control_state`. Writes
/// `PREPARING` before returning, so no external reader ever observes
/// `IDLE` between this call starting and `PREPARING` landing.
pub fn run(bus: Arc<SharedBus>, curve: Curve, config: SupervisorConfig, mpc_config: MpcConfig) {
    bus.set_control_state(control_state::PREPARING);
    info!("Entering PREPARING");

    let outcome = preparing(&bus, &config)
        .or_else(|| settle(&bus, &config))
        .or_else(|| preheat(&bus, &config))
        .unwrap_or_else(|| running(&bus, &curve, mpc_config));

    // Consumed exactly once per run, regardless of which phase observed it,
    // so a cancellation request can never leak forward into the next run
    // started on this same bus.
    bus.clear_cancel_run();

    bus.set_desired_oven_state(oven_state::IDLE);
    bus.set_desired_duty_cycle(0);

    match outcome {
        Outcome::Completed => {
            bus.set_control_state(control_state::COMPLETE);
            info!("Run COMPLETE");
        }
        Outcome::Cancelled => {
            bus.set_control_state(control_state::CANCELLED);
            info!("Run CANCELLED");
        }
        Outcome::Faulted => {
            bus.set_control_state(control_state::FAULT);
            error!("Run entered FAULT");
        }
    }
}

/// `should_exit`, `cancel_run`, or an oven-reported fault is checked
/// identically at the top of every phase's poll loop. `should_exit` means
/// the whole process is tearing down; `cancel_run` means only this run
/// should unwind -- both resolve to the same `Cancelled` outcome here.
fn terminal_event(bus: &SharedBus) -> Option<Outcome> {
    if bus.should_exit() || bus.cancel_run() {
        return Some(Outcome::Cancelled);
    }
    if bus.oven_reported_state() == oven_state::FAULT || bus.oven_error_bitmask() != 0 {
        warn!(
            error_bitmask = bus.oven_error_bitmask(),
            "Oven-reported fault observed"
        );
        return Some(Outcome::Faulted);
    }
    None
}

fn preparing(bus: &SharedBus, config: &SupervisorConfig) -> Option<Outcome> {
    loop {
        if let Some(outcome) = terminal_event(bus) {
            return Some(outcome);
        }

        let temperature = bus.current_temperature();
        if temperature > config.new_run_threshold_temperature {
            bus.set_desired_oven_state(oven_state::COOLING);
            bus.set_desired_duty_cycle(0);
        } else if !bus.door_open() {
            info!("Entering settle window");
            return None;
        }

        sleep(POLL_INTERVAL);
    }
}

fn settle(bus: &SharedBus, config: &SupervisorConfig) -> Option<Outcome> {
    let mut settle_start = Instant::now();
    let threshold = Duration::from_secs(config.settle_time_s);

    loop {
        if let Some(outcome) = terminal_event(bus) {
            return Some(outcome);
        }

        if bus.door_open() {
            settle_start = Instant::now();
        } else if settle_start.elapsed() >= threshold {
            info!("Entering preheat");
            return None;
        }

        sleep(POLL_INTERVAL);
    }
}

fn preheat(bus: &SharedBus, config: &SupervisorConfig) -> Option<Outcome> {
    bus.set_desired_oven_state(oven_state::HEATING);
    bus.set_desired_duty_cycle(100);
    let preheat_start = Instant::now();
    let threshold = Duration::from_secs(config.preheat_time_s);

    loop {
        if let Some(outcome) = terminal_event(bus) {
            return Some(outcome);
        }

        if bus.current_temperature() >= config.preheat_max_temperature
            || preheat_start.elapsed() >= threshold
        {
            info!("Entering RUNNING");
            return None;
        }

        sleep(POLL_INTERVAL);
    }
}

fn running(bus: &SharedBus, curve: &Curve, mpc_config: MpcConfig) -> Outcome {
    bus.set_control_state(control_state::RUNNING);
    bus.set_desired_oven_state(oven_state::HEATING);

    let reference = ReferenceTrajectory::from_curve(&curve.points());
    let end_temperature = curve.end_temperature();

    let mut mpc = Mpc::new(mpc_config);
    let run_start = Instant::now();
    let mut prev_duty = 100.0_f64;
    let mut peak_hit = false;
    let mut consecutive_failures = 0u32;
    let mut last_recorded_duration: Option<f64> = None;

    loop {
        if let Some(outcome) = terminal_event(bus) {
            return outcome;
        }

        let t0 = run_start.elapsed().as_secs_f64();
        let state = PlantState::new(
            bus.current_temperature(),
            bus.current_temperature_derivative(),
        );

        let duty = if peak_hit {
            0.0
        } else {
            match mpc.solve(state, &reference, t0, prev_duty) {
                Ok(solution) => {
                    consecutive_failures = 0;
                    solution.duty_cycle as f64
                }
                Err(e) => {
                    consecutive_failures += 1;
                    warn!("MPC solve failed ({}); retaining previous duty cycle", e);
                    if consecutive_failures >= MAX_CONSECUTIVE_SOLVER_FAILURES {
                        return Outcome::Faulted;
                    }
                    prev_duty
                }
            }
        };

        bus.set_desired_duty_cycle(duty.round().clamp(0.0, 100.0) as u8);
        prev_duty = duty;

        if !peak_hit && state.temperature >= reference.peak_temperature() {
            peak_hit = true;
            bus.set_desired_oven_state(oven_state::COOLING);
            bus.set_desired_duty_cycle(0);
            prev_duty = 0.0;
            info!("Peak temperature observed; forcing cooldown");
        }

        if last_recorded_duration != Some(t0) {
            bus.set_curve_duration_s(t0);
            last_recorded_duration = Some(t0);
        }

        if peak_hit && state.temperature <= end_temperature {
            return Outcome::Completed;
        }

        sleep(Duration::from_secs(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::tempdir;

    /// Zeroes every phase-timing threshold so `preparing`/`settle`/
    /// `preheat` fall through on their first poll, leaving `running` as
    /// the only phase a test has to wait real time on.
    fn fast_config() -> SupervisorConfig {
        SupervisorConfig {
            new_run_threshold_temperature: 1000.0,
            settle_time_s: 0,
            preheat_time_s: 0,
            preheat_max_temperature: -1000.0,
        }
    }

    fn flat_curve(temperature: f64) -> Curve {
        Curve {
            name: None,
            times: vec![0, 1],
            temperatures: vec![temperature, temperature],
        }
    }

    fn bus_in(dir: &tempfile::TempDir) -> Arc<SharedBus> {
        Arc::new(SharedBus::create(&dir.path().join("bus.bin")).unwrap())
    }

    #[test]
    fn s1_normal_run_reaches_peak_then_completes() {
        let dir = tempdir().unwrap();
        let bus = bus_in(&dir);
        bus.set_current_temperature(100.5);

        let run_bus = bus.clone();
        let handle = thread::spawn(move || {
            run(run_bus, flat_curve(100.0), fast_config(), MpcConfig::default());
        });

        // First RUNNING tick observes the peak; simulate the oven cooling
        // back down before the second tick checks for completion.
        thread::sleep(Duration::from_millis(400));
        bus.set_current_temperature(99.0);

        handle.join().unwrap();
        assert_eq!(bus.control_state(), control_state::COMPLETE);
        assert!(!bus.cancel_run());
    }

    #[test]
    fn s2_oven_reported_fault_aborts_the_run() {
        let dir = tempdir().unwrap();
        let bus = bus_in(&dir);

        let run_bus = bus.clone();
        let handle = thread::spawn(move || {
            run(run_bus, flat_curve(200.0), fast_config(), MpcConfig::default());
        });

        thread::sleep(Duration::from_millis(150));
        bus.set_oven_error_bitmask(0x40);

        handle.join().unwrap();
        assert_eq!(bus.control_state(), control_state::FAULT);
    }

    #[test]
    fn s3_cancel_run_aborts_without_touching_should_exit() {
        let dir = tempdir().unwrap();
        let bus = bus_in(&dir);
        // Holding the door open keeps `preparing` looping until cancelled.
        bus.set_door_open(true);

        let run_bus = bus.clone();
        let handle = thread::spawn(move || {
            run(run_bus, flat_curve(150.0), fast_config(), MpcConfig::default());
        });

        thread::sleep(Duration::from_millis(150));
        bus.set_cancel_run(true);

        handle.join().unwrap();
        assert_eq!(bus.control_state(), control_state::CANCELLED);
        assert!(!bus.should_exit());
        assert!(!bus.cancel_run());
    }

    #[test]
    fn should_exit_also_cancels_an_in_progress_run() {
        let dir = tempdir().unwrap();
        let bus = bus_in(&dir);
        bus.set_door_open(true);

        let run_bus = bus.clone();
        let handle = thread::spawn(move || {
            run(run_bus, flat_curve(150.0), fast_config(), MpcConfig::default());
        });

        thread::sleep(Duration::from_millis(150));
        bus.set_should_exit(true);

        handle.join().unwrap();
        assert_eq!(bus.control_state(), control_state::CANCELLED);
    }
}
