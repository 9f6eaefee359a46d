#![deny(clippy::all)]
#![deny(warnings)]

//! # Reflow TMS Protocol
//!
//! The newline-delimited JSON messaging protocol spoken between the
//! reflow host and the Thermal Management System (TMS) microcontroller
//! over a serial link.
//!
//! ## Key Components
//!
//! - **[`message`]**: Typed frame shapes for both directions of the link,
//!   plus the error-bitmask decoder.
//! - **[`codec`]**: A [`tokio_util::codec`] `Encoder`/`Decoder` pair that
//!   frames these messages as newline-terminated JSON.
//!
//! ## Design
//!
//! There is no separate keepalive message. The host's 2 Hz outbound
//! heartbeat frame *is* the liveness signal; an unusually long silence
//! from the TMS is itself the fault condition the link worker watches
//! for (see `reflow-host::tms_link`).

pub mod codec;
mod error;
pub mod message;

pub use codec::TmsLineCodec;
pub use error::Error;
pub use message::{error_to_strings, DoorState, InboundFrame, LogFrame, LogSeverity, OutboundFrame, OvenState, StatusFrame};
