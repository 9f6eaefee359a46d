//! Monitor
//!
//! The single authority translating shared-bus state and TMS telemetry
//! into the three event streams an embedding process subscribes to:
//! `reflow_status`, `oven_status`, and `log_message`. Also watches
//! supervisor liveness and clamps the oven's desired state outside the
//! phases that are allowed to drive it.
//!
//! `actual_history` has no home on the shared bus -- it only carries
//! scalars -- so the monitor assembles it itself from the TMS telemetry
//! stream, sampling once per elapsed second of the current run.

use std::sync::Arc;
use std::time::Duration;

use reflow_shared::{control_state, oven_state, SharedBus};
use tokio::process::Child;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, warn};

use crate::data_model::{
    record_history_sample, ControlState, HistorySample, LogMessage, OvenStatus, ReflowStatus,
};
use crate::tms_link::LinkEvent;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Broadcast senders the monitor publishes on. `main` holds this and
/// hands out `Receiver`s to whatever embeds this crate.
pub struct MonitorChannels {
    pub reflow_status: broadcast::Sender<ReflowStatus>,
    pub oven_status: broadcast::Sender<OvenStatus>,
    pub log_message: broadcast::Sender<LogMessage>,
}

impl MonitorChannels {
    pub fn new(capacity: usize) -> Self {
        Self {
            reflow_status: broadcast::channel(capacity).0,
            oven_status: broadcast::channel(capacity).0,
            log_message: broadcast::channel(capacity).0,
        }
    }
}

/// Runs until `bus.should_exit()`. Each time `ReflowController::start`
/// spawns a new supervisor child, it sends the handle over
/// `supervisor_rx`; the monitor polls whichever handle is current for
/// liveness and treats its unexpected exit during
/// PREPARING/RUNNING/COMPLETE as a control-process fault.
pub async fn run(
    bus: Arc<SharedBus>,
    mut supervisor_rx: mpsc::Receiver<Child>,
    mut events_rx: mpsc::Receiver<LinkEvent>,
    channels: Arc<MonitorChannels>,
) {
    let mut ticker = interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut supervisor: Option<Child> = None;
    let mut supervisor_alive = false;
    let mut last_published: Option<ReflowStatus> = None;
    let mut actual_history: Vec<HistorySample> = Vec::new();
    let mut prev_state = ControlState::from_bus_value(bus.control_state());

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            new_child = supervisor_rx.recv() => {
                match new_child {
                    Some(child) => {
                        supervisor = Some(child);
                        supervisor_alive = true;
                    }
                    None => {}
                }
                continue;
            }
            event = events_rx.recv() => {
                match event {
                    Some(LinkEvent::OvenStatus(status)) => {
                        let _ = channels.oven_status.send(status);
                    }
                    Some(LinkEvent::Log(message)) => {
                        let _ = channels.log_message.send(message);
                    }
                    None => {}
                }
                continue;
            }
        }

        if bus.should_exit() {
            return;
        }

        if supervisor_alive {
            if let Some(child) = supervisor.as_mut() {
                match child.try_wait() {
                    Ok(Some(exit_status)) => {
                        supervisor_alive = false;
                        warn!(?exit_status, "Supervisor process exited");
                    }
                    Ok(None) => {}
                    Err(e) => error!("Failed to poll supervisor process: {}", e),
                }
            }
        }

        let mut state = ControlState::from_bus_value(bus.control_state());
        // COMPLETE is excluded here even though it's one of the "a run is
        // active" states: the supervisor writes COMPLETE immediately
        // before its own (expected) exit, so by the time this poll
        // observes it, `supervisor_alive` flipping false is normal, not a
        // fault.
        let supervisor_should_run = matches!(state, ControlState::Preparing | ControlState::Running);

        if supervisor_should_run && !supervisor_alive {
            bus.set_control_state(control_state::FAULT);
            bus.set_desired_oven_state(oven_state::IDLE);
            bus.set_desired_duty_cycle(0);
            state = ControlState::Fault;
        }

        if !matches!(
            state,
            ControlState::Preparing | ControlState::Running | ControlState::Complete
        ) {
            if bus.desired_oven_state() != oven_state::IDLE {
                bus.set_desired_oven_state(oven_state::IDLE);
            }
            if bus.desired_duty_cycle() != 0 {
                bus.set_desired_duty_cycle(0);
            }
        }

        // The run's own elapsed time starts counting when RUNNING begins,
        // not when PREPARING does -- settle/preheat duration must not
        // offset `actual_history`'s `elapsed_s` values.
        if state == ControlState::Running && prev_state != ControlState::Running {
            actual_history.clear();
        }
        prev_state = state;

        if matches!(state, ControlState::Running | ControlState::Complete) {
            // `curve_duration_s` is the supervisor's own elapsed-seconds
            // clock for this run (`phases::running`'s `t0`), not a
            // wall-clock reading taken here; `record_history_sample`
            // dedups against the last entry, so polling faster than the
            // supervisor ticks is harmless.
            let elapsed = bus.curve_duration_s().round() as u32;
            record_history_sample(&mut actual_history, elapsed, bus.current_temperature());
        }

        let status = ReflowStatus {
            state,
            error: (!supervisor_alive && supervisor_should_run)
                .then(|| "Control process died".to_string()),
            actual_history: if matches!(state, ControlState::Running | ControlState::Complete) {
                actual_history.clone()
            } else {
                Vec::new()
            },
        };

        if last_published.as_ref() != Some(&status) {
            let _ = channels.reflow_status.send(status.clone());
            last_published = Some(status);
        }
    }
}
