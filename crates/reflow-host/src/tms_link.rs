//! TMS Link
//!
//! Owns the serial port exclusively for the process's lifetime. Sends
//! the 2 Hz outbound heartbeat, decodes inbound status/log frames into
//! the shared bus and the monitor's channels, and drives the hardware
//! reset line when the TMS goes quiet for too long.
//!
//! There is no separate keepalive message: the outbound heartbeat *is*
//! the liveness signal in both directions -- its regular transmission
//! keeps the MCU's own watchdog happy, and the absence of any inbound
//! frame for `heartbeat_receive_threshold` is what triggers a reset.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use reflow_proto::{InboundFrame, OutboundFrame, OvenState, TmsLineCodec};
use reflow_shared::SharedBus;
use reflow_thermal::DerivativeEstimator;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, timeout};
use tokio_serial::SerialPortBuilderExt;
use tokio_util::codec::Framed;
use tracing::{error, info, warn};

use crate::config::{GpioConfig, SerialConfig};
use crate::data_model::{LogMessage, LogSeverity, OvenStatus};

const HEARTBEAT_SEND_INTERVAL: Duration = Duration::from_millis(500);
const RESET_PULSE_WIDTH: Duration = Duration::from_millis(100);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Events the link publishes for the monitor to forward to external
/// subscribers.
pub enum LinkEvent {
    OvenStatus(OvenStatus),
    Log(LogMessage),
}

/// Runs the TMS link until `bus.should_exit()`. Reconnects on any serial
/// error; a parse error on a single frame is logged and discarded, never
/// treated as link silence. Claims the GPIO reset line once, for the
/// lifetime of this task, rather than per reset.
pub async fn run(
    serial: SerialConfig,
    gpio: GpioConfig,
    heartbeat_receive_threshold_ms: u64,
    bus: Arc<SharedBus>,
    events_tx: mpsc::Sender<LinkEvent>,
) {
    info!(port = %serial.port, baud = serial.baud_rate, "Starting TMS link");

    let reset_line = match claim_reset_line(&gpio) {
        Ok(line) => line,
        Err(e) => {
            error!("Failed to claim GPIO reset line: {}. TMS link cannot start.", e);
            return;
        }
    };

    loop {
        if bus.should_exit() {
            info!("TMS link exiting");
            return;
        }

        match tokio_serial::new(&serial.port, serial.baud_rate).open_native_async() {
            Ok(port) => {
                info!("Connected to TMS");
                if let Err(e) = link_session(
                    port,
                    &reset_line,
                    heartbeat_receive_threshold_ms,
                    &bus,
                    &events_tx,
                )
                .await
                {
                    error!("TMS link session ended: {}. Reconnecting.", e);
                }
            }
            Err(e) => {
                warn!("Failed to open TMS serial port: {}. Retrying in {:?}.", e, RECONNECT_DELAY);
            }
        }

        sleep(RECONNECT_DELAY).await;
    }
    // `reset_line` drops here on every return path above, releasing the
    // GPIO claim.
}

/// Opens the GPIO chip and requests the reset line as an output, held
/// high (inactive) by default. Held by the caller for as long as the
/// link runs; the chip handle itself can be dropped once the line is
/// claimed.
fn claim_reset_line(gpio: &GpioConfig) -> Result<LineHandle> {
    let mut chip = Chip::new(&gpio.chip)
        .with_context(|| format!("opening GPIO chip {}", gpio.chip))?;
    chip.get_line(gpio.line)
        .with_context(|| format!("getting GPIO line {}", gpio.line))?
        .request(LineRequestFlags::OUTPUT, 1, "reflow-tms-reset")
        .context("requesting GPIO output line")
}

/// One connected session: runs until a serial error, `should_exit`, or
/// link silence triggers a reset.
async fn link_session(
    port: tokio_serial::SerialStream,
    reset_line: &LineHandle,
    heartbeat_receive_threshold_ms: u64,
    bus: &Arc<SharedBus>,
    events_tx: &mpsc::Sender<LinkEvent>,
) -> Result<()> {
    let mut framed = Framed::new(port, TmsLineCodec::new());
    let mut heartbeat = interval(HEARTBEAT_SEND_INTERVAL);
    let mut last_frame_at = Instant::now();
    let mut derivative = DerivativeEstimator::new();

    loop {
        if bus.should_exit() {
            return Ok(());
        }

        tokio::select! {
            _ = heartbeat.tick() => {
                let oven_state = OvenState::try_from(bus.desired_oven_state())
                    .unwrap_or(OvenState::Fault);
                let frame = OutboundFrame {
                    state: oven_state,
                    pwm: bus.desired_duty_cycle(),
                };
                framed.send(frame).await.context("writing heartbeat frame")?;
            }

            received = timeout(Duration::from_millis(250), framed.next()) => {
                match received {
                    Ok(Some(Ok(frame))) => {
                        last_frame_at = Instant::now();
                        handle_inbound_frame(frame, bus, events_tx, &mut derivative).await;
                    }
                    Ok(Some(Err(e))) => {
                        warn!("Discarding malformed TMS frame: {}", e);
                    }
                    Ok(None) => {
                        return Err(anyhow::anyhow!("TMS closed the connection"));
                    }
                    Err(_elapsed) => {
                        // No frame in this poll window; fall through to the
                        // silence check below.
                    }
                }
            }
        }

        if last_frame_at.elapsed() >= Duration::from_millis(heartbeat_receive_threshold_ms) || bus.should_reset() {
            warn!("TMS link silent past threshold; asserting hardware reset");
            reset_tms(reset_line).await?;
            bus.clear_should_reset();
            last_frame_at = Instant::now();
        }
    }
}

async fn handle_inbound_frame(
    frame: InboundFrame,
    bus: &Arc<SharedBus>,
    events_tx: &mpsc::Sender<LinkEvent>,
    derivative: &mut DerivativeEstimator,
) {
    match frame {
        InboundFrame::Status(status_frame) => match OvenStatus::from_frame(&status_frame) {
            Ok(status) => {
                let estimate = derivative.push(status_frame.time as f64 / 1000.0, status.temperature);
                bus.set_current_temperature(status.temperature);
                bus.set_current_temperature_derivative(estimate);
                bus.set_door_open(status.door_open);
                bus.set_oven_reported_state(status_frame.state);
                bus.set_oven_error_bitmask(status_frame.error);
                let _ = events_tx.send(LinkEvent::OvenStatus(status)).await;
            }
            Err(e) => warn!("Rejecting out-of-range oven status: {}", e),
        },
        InboundFrame::Log(log_frame) => {
            let message = LogMessage {
                time_ms: log_frame.time,
                severity: LogSeverity::from_wire(log_frame.severity),
                message: log_frame.message,
            };
            let _ = events_tx.send(LinkEvent::Log(message)).await;
        }
    }
}

/// Pulses the already-claimed reset line: inactive for
/// [`RESET_PULSE_WIDTH`], then active, power-cycling the TMS
/// microcontroller. Does not acquire or release the line itself.
async fn reset_tms(reset_line: &LineHandle) -> Result<()> {
    reset_line.set_value(0).context("driving reset line inactive")?;
    sleep(RESET_PULSE_WIDTH).await;
    reset_line.set_value(1).context("driving reset line active")?;

    info!("TMS reset pulse complete");
    Ok(())
}
