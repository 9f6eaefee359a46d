//! # Simulated TMS
//!
//! A deterministic stand-in for the physical oven's Thermal Management
//! System, for exercising `reflow-host` and `reflow-supervisor` in CI
//! without real hardware. [`SimTms`] speaks the exact wire protocol
//! over a Unix-domain socket in place of a serial port; [`SimHost`]
//! plays the host's side of that protocol from a test and records a
//! trace of everything exchanged.

pub mod fake_tms;
pub mod harness;

pub use fake_tms::SimTms;
pub use harness::{SimHost, TraceEntry};
