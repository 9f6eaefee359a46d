//! Reflow Data Model
//!
//! Defines the shapes exchanged with the (out-of-scope) HTTP/WebSocket
//! layer and persisted for the duration of one run: the curve a user
//! submits, the oven's reported telemetry, the supervisor's phase, and
//! the accumulated history of one run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A time/temperature trajectory the supervisor drives the oven through.
/// Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflowCurve {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub times: Vec<u32>,
    pub temperatures: Vec<f64>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CurveValidationError {
    #[error("times and temperatures must be the same length ({times} vs {temperatures})")]
    LengthMismatch { times: usize, temperatures: usize },
    #[error("curve must contain at least one point")]
    Empty,
    #[error("times must be strictly ascending (index {index} is not greater than the previous)")]
    NotAscending { index: usize },
}

impl ReflowCurve {
    /// Validates the invariants the supervisor depends on: equal-length
    /// series, at least one point, and strictly ascending times.
    pub fn validate(&self) -> Result<(), CurveValidationError> {
        if self.times.len() != self.temperatures.len() {
            return Err(CurveValidationError::LengthMismatch {
                times: self.times.len(),
                temperatures: self.temperatures.len(),
            });
        }
        if self.times.is_empty() {
            return Err(CurveValidationError::Empty);
        }
        for (index, pair) in self.times.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(CurveValidationError::NotAscending { index: index + 1 });
            }
        }
        Ok(())
    }

    /// Index of the highest-temperature point. Points after it are
    /// cooldown and are not tracked by the optimizer.
    pub fn peak_index(&self) -> usize {
        self.temperatures
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(idx, _)| idx)
            .unwrap_or(0)
    }

    pub fn peak_temperature(&self) -> f64 {
        self.temperatures[self.peak_index()]
    }

    /// The oven's end temperature: the last curve point, used to detect
    /// the RUNNING -> COMPLETE transition.
    pub fn end_temperature(&self) -> f64 {
        *self.temperatures.last().expect("validated: non-empty")
    }

    /// Points as `(time_s, temperature_c)` pairs, for
    /// `reflow_thermal::ReferenceTrajectory::from_curve`.
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.times
            .iter()
            .zip(self.temperatures.iter())
            .map(|(&t, &temp)| (t as f64, temp))
            .collect()
    }
}

/// Supervisor phase, mirrors `reflow_shared::layout::control_state`'s
/// numeric encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlState {
    Idle,
    Preparing,
    Running,
    Complete,
    Cancelled,
    Fault,
}

impl ControlState {
    pub fn from_bus_value(value: u8) -> Self {
        use reflow_shared::control_state::*;
        match value {
            IDLE => ControlState::Idle,
            PREPARING => ControlState::Preparing,
            RUNNING => ControlState::Running,
            COMPLETE => ControlState::Complete,
            CANCELLED => ControlState::Cancelled,
            _ => ControlState::Fault,
        }
    }

    pub fn to_bus_value(self) -> u8 {
        use reflow_shared::control_state::*;
        match self {
            ControlState::Idle => IDLE,
            ControlState::Preparing => PREPARING,
            ControlState::Running => RUNNING,
            ControlState::Complete => COMPLETE,
            ControlState::Cancelled => CANCELLED,
            ControlState::Fault => FAULT,
        }
    }

    /// Whether the oven should be forced to IDLE duty while in this
    /// state (invariant 2: see `SPEC_FULL.md` §8).
    pub fn forces_oven_idle(self) -> bool {
        matches!(self, ControlState::Idle | ControlState::Cancelled | ControlState::Fault)
    }
}

/// One sample recorded once per second while RUNNING.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    pub elapsed_s: u32,
    pub temperature: f64,
}

/// Appends a sample to `history`, enforcing invariant 3: `actual_history`
/// is strictly monotonic in `elapsed_s`. A repeated or out-of-order
/// `elapsed_s` is silently deduplicated rather than treated as an error,
/// since callers may poll faster than the source ticks.
pub fn record_history_sample(history: &mut Vec<HistorySample>, elapsed_s: u32, temperature: f64) {
    if history.last().is_some_and(|last| last.elapsed_s >= elapsed_s) {
        return;
    }
    history.push(HistorySample {
        elapsed_s,
        temperature,
    });
}

/// A single in-progress or finished run: the curve plus what actually
/// happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflowRun {
    pub curve: ReflowCurve,
    pub state: ControlState,
    pub actual_history: Vec<HistorySample>,
    pub error: Option<String>,
}

impl ReflowRun {
    pub fn new(curve: ReflowCurve) -> Self {
        Self {
            curve,
            state: ControlState::Preparing,
            actual_history: Vec::new(),
            error: None,
        }
    }

    /// Appends a sample; see [`record_history_sample`] for the dedup rule.
    pub fn record_sample(&mut self, elapsed_s: u32, temperature: f64) {
        record_history_sample(&mut self.actual_history, elapsed_s, temperature);
    }
}

/// Oven telemetry, decoded from a `reflow_proto::StatusFrame`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OvenStatus {
    pub time_ms: u64,
    pub temperature: f64,
    pub oven_state: reflow_proto::OvenState,
    pub duty_cycle: u8,
    pub door_open: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OvenStatusValidationError {
    #[error("duty_cycle {0} is out of range 0..=100")]
    DutyCycleOutOfRange(u8),
}

impl OvenStatus {
    pub fn validate(&self) -> Result<(), OvenStatusValidationError> {
        if self.duty_cycle > 100 {
            return Err(OvenStatusValidationError::DutyCycleOutOfRange(self.duty_cycle));
        }
        Ok(())
    }

    pub fn from_frame(frame: &reflow_proto::StatusFrame) -> Result<Self, OvenStatusValidationError> {
        let oven_state = reflow_proto::OvenState::try_from(frame.state)
            .unwrap_or(reflow_proto::OvenState::Fault);
        let status = Self {
            time_ms: frame.time,
            temperature: frame.current,
            oven_state,
            duty_cycle: frame.pwm,
            door_open: frame.door.is_open(),
            errors: reflow_proto::error_to_strings(frame.error)
                .into_iter()
                .map(str::to_string)
                .collect(),
        };
        status.validate()?;
        Ok(status)
    }
}

/// Severity of a log line, parsed case-insensitively from its member
/// name when it arrives as a string (the bitmask/int form comes
/// straight off the wire via `reflow_proto::LogSeverity`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogSeverity {
    Debug,
    Info,
    Warn,
    Critical,
}

impl LogSeverity {
    pub fn from_wire(value: u8) -> Self {
        match value {
            0 => LogSeverity::Debug,
            1 => LogSeverity::Info,
            2 => LogSeverity::Warn,
            _ => LogSeverity::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub time_ms: u64,
    pub severity: LogSeverity,
    pub message: String,
}

/// A `reflow_status` event: published by the monitor whenever the
/// rendered status differs from the previously published one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflowStatus {
    pub state: ControlState,
    pub error: Option<String>,
    pub actual_history: Vec<HistorySample>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(times: Vec<u32>, temps: Vec<f64>) -> ReflowCurve {
        ReflowCurve {
            name: None,
            description: None,
            times,
            temperatures: temps,
        }
    }

    #[test]
    fn validate_rejects_length_mismatch() {
        let c = curve(vec![0, 1], vec![25.0]);
        assert_eq!(
            c.validate(),
            Err(CurveValidationError::LengthMismatch {
                times: 2,
                temperatures: 1
            })
        );
    }

    #[test]
    fn validate_rejects_empty_curve() {
        let c = curve(vec![], vec![]);
        assert_eq!(c.validate(), Err(CurveValidationError::Empty));
    }

    #[test]
    fn validate_rejects_non_ascending_times() {
        let c = curve(vec![0, 30, 20], vec![25.0, 150.0, 200.0]);
        assert_eq!(c.validate(), Err(CurveValidationError::NotAscending { index: 2 }));
    }

    #[test]
    fn validate_accepts_well_formed_curve() {
        let c = curve(vec![0, 30, 60, 90], vec![25.0, 150.0, 210.0, 25.0]);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn peak_index_finds_the_maximum() {
        let c = curve(vec![0, 30, 60, 90], vec![25.0, 150.0, 210.0, 25.0]);
        assert_eq!(c.peak_index(), 2);
        assert_eq!(c.peak_temperature(), 210.0);
        assert_eq!(c.end_temperature(), 25.0);
    }

    #[test]
    fn history_sample_recording_deduplicates_non_advancing_elapsed_s() {
        let mut run = ReflowRun::new(curve(vec![0, 1], vec![25.0, 26.0]));
        run.record_sample(0, 25.0);
        run.record_sample(0, 25.1); // duplicate tick, dropped
        run.record_sample(1, 26.0);
        assert_eq!(run.actual_history.len(), 2);
        assert_eq!(run.actual_history[1].elapsed_s, 1);
    }

    #[test]
    fn oven_status_validation_rejects_out_of_range_duty_cycle() {
        let status = OvenStatus {
            time_ms: 0,
            temperature: 25.0,
            oven_state: reflow_proto::OvenState::Idle,
            duty_cycle: 150,
            door_open: false,
            errors: vec![],
        };
        assert!(status.validate().is_err());
    }

    #[test]
    fn control_state_forces_oven_idle_in_terminal_states() {
        assert!(ControlState::Idle.forces_oven_idle());
        assert!(ControlState::Cancelled.forces_oven_idle());
        assert!(ControlState::Fault.forces_oven_idle());
        assert!(!ControlState::Running.forces_oven_idle());
    }
}
