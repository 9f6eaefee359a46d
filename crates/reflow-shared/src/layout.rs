//! `repr(C)` memory layout of the shared-state bus.
//!
//! Every field is a fixed-width atomic so a single load/store is the
//! entire read or write: no pointers, no lists, no serialization step
//! crossing the process boundary. Floats are stored as their bit
//! pattern in an `AtomicU64`/`AtomicU32`, the same trick used for
//! lock-free float fields generally, since `core::sync::atomic` has no
//! atomic float type.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8};

/// Identifies a valid bus file, distinguishing it from an arbitrary
/// zero-filled or truncated file someone points us at by accident.
pub const MAGIC: u64 = 0x5245_464C_4F57_4255; // arbitrary, just needs to be unlikely to occur by accident
pub const LAYOUT_VERSION: u32 = 1;

/// `control_state` encoding. Kept numeric (rather than referencing
/// `reflow-host`'s richer enum) so this crate has no dependency on the
/// binary that owns the business logic.
pub mod control_state {
    pub const IDLE: u8 = 0;
    pub const PREPARING: u8 = 1;
    pub const RUNNING: u8 = 2;
    pub const COMPLETE: u8 = 3;
    pub const CANCELLED: u8 = 4;
    pub const FAULT: u8 = 5;
}

/// `desired_oven_state` encoding, matching `reflow_proto::OvenState`'s
/// wire values exactly so the TMS link worker can pass it through with
/// no translation.
pub mod oven_state {
    pub const IDLE: u8 = 0;
    pub const HEATING: u8 = 1;
    pub const COOLING: u8 = 2;
    pub const FAULT: u8 = 3;
}

/// The mapped layout of the shared-state bus. `#[repr(C)]` so the byte
/// layout is identical in both processes regardless of compiler version,
/// and `align(64)` so the whole header sits in a single cache line.
#[repr(C, align(64))]
pub struct BusLayout {
    pub magic: AtomicU64,
    pub version: AtomicU32,

    /// Written exclusively by the TMS link.
    pub current_temperature_bits: AtomicU64,
    pub current_temperature_derivative_bits: AtomicU64,
    pub door_open: AtomicU8,
    pub oven_reported_state: AtomicU8,
    pub oven_error_bitmask: AtomicU8,

    /// Written exclusively by the reflow supervisor.
    pub control_state: AtomicU8,
    pub desired_oven_state: AtomicU8,
    pub desired_duty_cycle: AtomicU8,
    pub curve_duration_bits: AtomicU64,

    /// Cross-cutting events, set by whichever side requests the
    /// transition and cleared by whichever side acts on it.
    pub should_exit: AtomicU8,
    pub should_reset: AtomicU8,

    /// Set by the host to request cancellation of the *current* run only;
    /// observed and cleared exclusively by the reflow supervisor. Distinct
    /// from `should_exit`, which tears down the whole process -- a single
    /// shared flag for both would let the monitor and TMS link (which key
    /// off `should_exit` for process-lifetime shutdown) mistake a
    /// one-run cancellation for a full process exit.
    pub cancel_run: AtomicU8,
}

impl BusLayout {
    pub const SIZE: usize = std::mem::size_of::<BusLayout>();

    /// Initializes a freshly-mapped region to its rest state. Called
    /// once by whichever process creates the backing file.
    pub fn init(&self) {
        use std::sync::atomic::Ordering::Relaxed;
        self.magic.store(MAGIC, Relaxed);
        self.version.store(LAYOUT_VERSION, Relaxed);
        self.current_temperature_bits.store(0f64.to_bits(), Relaxed);
        self.current_temperature_derivative_bits
            .store(0f64.to_bits(), Relaxed);
        self.door_open.store(0, Relaxed);
        self.oven_reported_state.store(oven_state::IDLE, Relaxed);
        self.oven_error_bitmask.store(0, Relaxed);
        self.control_state.store(control_state::IDLE, Relaxed);
        self.desired_oven_state.store(oven_state::IDLE, Relaxed);
        self.desired_duty_cycle.store(0, Relaxed);
        self.curve_duration_bits.store(0f64.to_bits(), Relaxed);
        self.should_exit.store(0, Relaxed);
        self.should_reset.store(0, Relaxed);
        self.cancel_run.store(0, Relaxed);
    }
}
