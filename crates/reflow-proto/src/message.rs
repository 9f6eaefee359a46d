//! Frame shapes for the TMS wire protocol (see the outbound/inbound JSON
//! schemas this crate's [`crate::codec`] encodes and decodes).

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Oven state as reported by, or commanded to, the TMS. Encoded on the wire
/// as a bare integer (`0..=3`), not as a string, so (de)serialization is
/// implemented by hand rather than derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OvenState {
    Idle = 0,
    Heating = 1,
    Cooling = 2,
    Fault = 3,
}

impl TryFrom<u8> for OvenState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OvenState::Idle),
            1 => Ok(OvenState::Heating),
            2 => Ok(OvenState::Cooling),
            3 => Ok(OvenState::Fault),
            other => Err(other),
        }
    }
}

impl Serialize for OvenState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for OvenState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        OvenState::try_from(raw)
            .map_err(|bad| serde::de::Error::custom(format!("unknown oven state {bad}")))
    }
}

/// Door sensor reading as reported by the TMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    Open,
    Closed,
}

impl DoorState {
    pub fn is_open(self) -> bool {
        matches!(self, DoorState::Open)
    }
}

/// Severity of a log line emitted by the TMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LogSeverity {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Critical = 3,
}

/// The heartbeat frame the host sends to the TMS, 2 Hz, outbound only.
///
/// There is no separate keepalive message: sending this frame on schedule
/// *is* the heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub state: OvenState,
    pub pwm: u8,
}

/// A status telemetry frame from the TMS. The `current` field is what
/// discriminates this shape from [`LogFrame`] on the wire: its absence is
/// what identifies an inbound line as a log line instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusFrame {
    pub time: u64,
    pub current: f64,
    pub state: u8,
    pub pwm: u8,
    pub door: DoorState,
    pub error: u8,
}

/// A log line emitted by the TMS outside of normal status telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogFrame {
    pub message: String,
    pub severity: u8,
    pub time: u64,
}

/// Any inbound line from the TMS, discriminated structurally: a line is a
/// [`StatusFrame`] if it carries a `current` field, a [`LogFrame`]
/// otherwise. `serde(untagged)` tries variants in declaration order, so
/// `Status` is listed first and simply fails to deserialize (missing
/// field) when `current` is absent, falling through to `Log`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InboundFrame {
    Status(StatusFrame),
    Log(LogFrame),
}

/// Decodes the error bitmask reported in a [`StatusFrame`] into
/// human-readable strings, one per set bit.
pub fn error_to_strings(error: u8) -> Vec<&'static str> {
    const BITS: &[(u8, &str)] = &[
        (0x01, "Door opened during heating"),
        (0x08, "Current temperature too low"),
        (0x10, "Current temperature too high"),
        (0x20, "Current temperature not rising during heating"),
        (0x40, "Fault while reading current temperature"),
        (0x80, "UI timeout"),
    ];
    BITS.iter()
        .filter(|(bit, _)| error & bit != 0)
        .map(|(_, msg)| *msg)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_frame_discriminates_on_current_field() {
        let line = r#"{"time":100,"current":25.4,"state":1,"pwm":50,"door":"closed","error":0}"#;
        let frame: InboundFrame = serde_json::from_str(line).unwrap();
        assert!(matches!(frame, InboundFrame::Status(_)));
    }

    #[test]
    fn log_frame_discriminates_on_missing_current_field() {
        let line = r#"{"message":"boot","severity":1,"time":5}"#;
        let frame: InboundFrame = serde_json::from_str(line).unwrap();
        assert!(matches!(frame, InboundFrame::Log(_)));
    }

    #[test]
    fn error_bitmask_decodes_all_bits() {
        let strings = error_to_strings(0x01 | 0x80);
        assert_eq!(strings.len(), 2);
        assert!(strings.contains(&"Door opened during heating"));
        assert!(strings.contains(&"UI timeout"));
    }

    #[test]
    fn error_bitmask_decodes_to_empty_when_zero() {
        assert!(error_to_strings(0).is_empty());
    }

    #[test]
    fn outbound_frame_round_trips() {
        let frame = OutboundFrame {
            state: OvenState::Heating,
            pwm: 42,
        };
        let json = serde_json::to_string(&frame).unwrap();
        let back: OutboundFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(frame, back);
    }
}
