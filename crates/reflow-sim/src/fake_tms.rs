//! Simulated TMS Microcontroller
//!
//! Stands in for the physical Thermal Management System: speaks the
//! same newline-delimited JSON protocol as `reflow-proto`, over a
//! Unix-domain socket instead of a serial port, and steps the §4.A
//! plant equations on the same 1 s Euler discretization the MPC uses
//! internally, so a trace recorded against this simulator agrees with
//! one recorded against the real oven given the same inputs.

use std::time::Duration;

use anyhow::{Context, Result};
use reflow_proto::{DoorState, InboundFrame, OutboundFrame, OvenState, StatusFrame};
use reflow_thermal::PlantState;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

/// One Euler step of the simulated plant, matching the MPC's and the
/// real oven's own tick.
const TICK: Duration = Duration::from_secs(1);

/// A simulated TMS. Accepts a single host connection on `socket_path`,
/// applies each inbound `OutboundFrame`'s commanded duty cycle to the
/// plant, and reports a `StatusFrame` once per tick.
pub struct SimTms {
    socket_path: String,
    initial_temperature: f64,
    /// Mirrors the real TMS's disabled 45 s fault-injection timer: when
    /// set, the simulator reports a fault (`error = 0x40`, "fault while
    /// reading current temperature") once the timer elapses, and never
    /// otherwise. `None` by default.
    fault_injection: Option<Duration>,
}

impl SimTms {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
            initial_temperature: 25.0,
            fault_injection: None,
        }
    }

    pub fn with_initial_temperature(mut self, temperature: f64) -> Self {
        self.initial_temperature = temperature;
        self
    }

    pub fn with_fault_injection(mut self, after: Duration) -> Self {
        self.fault_injection = Some(after);
        self
    }

    /// Runs the simulator, accepting exactly one host connection and
    /// serving it until the host disconnects.
    pub async fn run(&self) -> Result<()> {
        let _ = std::fs::remove_file(&self.socket_path);
        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("binding simulated TMS socket at {}", self.socket_path))?;
        info!(path = %self.socket_path, "Simulated TMS listening");

        let (stream, _) = listener.accept().await.context("accepting host connection")?;
        info!("Simulated TMS accepted host connection");
        self.session(stream).await
    }

    async fn session(&self, stream: UnixStream) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        let mut plant = PlantState::new(self.initial_temperature, 0.0);
        let mut commanded_state = OvenState::Idle;
        let mut commanded_duty: f64 = 0.0;
        let mut time_ms: u64 = 0;
        let mut elapsed = Duration::ZERO;

        let mut ticker = tokio::time::interval(TICK);

        loop {
            tokio::select! {
                res = reader.read_line(&mut line) => {
                    if res.context("reading from host")? == 0 {
                        info!("Host disconnected");
                        return Ok(());
                    }
                    match serde_json::from_str::<OutboundFrame>(line.trim()) {
                        Ok(frame) => {
                            debug!(?frame, "Simulated TMS received heartbeat");
                            commanded_state = frame.state;
                            commanded_duty = frame.pwm as f64;
                        }
                        Err(e) => warn!("Discarding malformed heartbeat: {}", e),
                    }
                    line.clear();
                }

                _ = ticker.tick() => {
                    let duty = match commanded_state {
                        OvenState::Heating => commanded_duty,
                        _ => 0.0,
                    };
                    plant = plant.step(duty, TICK.as_secs_f64());
                    time_ms += TICK.as_millis() as u64;
                    elapsed += TICK;

                    let error = match self.fault_injection {
                        Some(after) if elapsed >= after => 0x40,
                        _ => 0,
                    };
                    let reported_state = if error != 0 { OvenState::Fault } else { commanded_state };

                    let status = StatusFrame {
                        time: time_ms,
                        current: plant.temperature,
                        state: reported_state as u8,
                        pwm: commanded_duty as u8,
                        door: DoorState::Closed,
                        error,
                    };
                    let json = serde_json::to_string(&InboundFrame::Status(status))
                        .context("encoding status frame")?
                        + "\n";
                    writer.write_all(json.as_bytes()).await.context("writing status frame")?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt as _;

    #[tokio::test]
    async fn reports_rising_temperature_under_sustained_duty() {
        let socket_path = "/tmp/reflow_sim_test_heating.sock";
        let _ = std::fs::remove_file(socket_path);
        let tms = SimTms::new(socket_path).with_initial_temperature(25.0);

        let server = tokio::spawn(async move {
            tms.run().await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut stream = UnixStream::connect(socket_path).await.unwrap();
        let heartbeat = OutboundFrame {
            state: OvenState::Heating,
            pwm: 100,
        };
        let line = serde_json::to_string(&heartbeat).unwrap() + "\n";
        stream.write_all(line.as_bytes()).await.unwrap();

        let mut reader = BufReader::new(stream);
        let mut response = String::new();
        reader.read_line(&mut response).await.unwrap();
        let frame: InboundFrame = serde_json::from_str(response.trim()).unwrap();
        let InboundFrame::Status(status) = frame else {
            panic!("expected a status frame");
        };
        assert_eq!(status.time, 1000);

        server.abort();
        let _ = std::fs::remove_file(socket_path);
    }
}
