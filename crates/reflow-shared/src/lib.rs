//! # Reflow Shared-State Bus
//!
//! A fixed set of atomic scalar cells, backed by a memory-mapped file,
//! shared between the reflow host process and the reflow supervisor
//! child process it spawns. Each cell has exactly one writer; readers
//! get a tear-free snapshot of any individual cell but no cross-cell
//! atomicity, matching the concurrency model the supervisor and monitor
//! are built around.
//!
//! Grounded on the atomics-in-a-mapped-segment pattern used elsewhere in
//! this codebase for cross-process shared memory, simplified down to
//! the handful of scalars this system actually needs: no cache-line
//! prefetch hints, no layout optimizer, just the cells.

pub mod bus;
mod error;
pub mod layout;

pub use bus::{default_bus_path, SharedBus};
pub use error::Error;
pub use layout::{control_state, oven_state, BusLayout};
