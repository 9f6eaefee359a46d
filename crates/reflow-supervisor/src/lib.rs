//! # Reflow Supervisor
//!
//! The reflow state machine and MPC optimizer, built to run as its own
//! OS process rather than an in-process task: the optimizer is a
//! from-scratch numerical solver operating on user-supplied curves, and
//! a panic or arithmetic fault inside it must take down only this
//! process, never the host or the TMS link it shares a machine with.
//!
//! Communicates with the host exclusively through the memory-mapped bus
//! in `reflow-shared`; see [`phases::run`].

pub mod curve;
mod phases;

pub use curve::{Curve, CurveError};
pub use phases::{run, SupervisorConfig};
