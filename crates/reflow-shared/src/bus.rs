//! Memory-mapped shared-state bus.
//!
//! The host creates the backing file before spawning the reflow
//! supervisor as a child process and passes the path on its command
//! line; both processes `mmap` the same file, so every cell read or
//! write is a single atomic load/store on shared physical memory.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering::Relaxed;

use memmap2::MmapMut;

use crate::layout::{BusLayout, LAYOUT_VERSION, MAGIC};
use crate::Error;

/// A handle to the shared-state bus, mapped into this process's address
/// space. Dropping it unmaps the region; the backing file persists
/// until the owning process (the host) removes it.
pub struct SharedBus {
    mmap: MmapMut,
}

impl SharedBus {
    /// Creates (or truncates) the backing file at `path`, maps it, and
    /// initializes it to the rest state. Call this from the process
    /// that owns the bus's lifetime -- the host, before spawning the
    /// supervisor.
    pub fn create(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })?;
        file.set_len(BusLayout::SIZE as u64)
            .map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let mut mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_mmap(&mut mmap, path, true)?;
        Ok(Self { mmap })
    }

    /// Attaches to an existing bus file created by [`SharedBus::create`].
    /// Used by the reflow supervisor and the monitor.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let metadata = file.metadata().map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if metadata.len() != BusLayout::SIZE as u64 {
            return Err(Error::WrongSize {
                path: path.to_path_buf(),
                actual: metadata.len(),
                expected: BusLayout::SIZE as u64,
            });
        }

        let mut mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_mmap(&mut mmap, path, false)?;
        Ok(Self { mmap })
    }

    fn from_mmap(mmap: &mut MmapMut, path: &Path, initializing: bool) -> Result<(), Error> {
        let layout = Self::layout_ref(mmap);
        if initializing {
            layout.init();
            return Ok(());
        }

        let magic = layout.magic.load(Relaxed);
        if magic != MAGIC {
            return Err(Error::BadMagic {
                path: path.to_path_buf(),
                actual: magic,
                expected: MAGIC,
            });
        }
        let version = layout.version.load(Relaxed);
        if version != LAYOUT_VERSION {
            return Err(Error::VersionMismatch {
                path: path.to_path_buf(),
                actual: version,
                expected: LAYOUT_VERSION,
            });
        }
        Ok(())
    }

    fn layout_ref(mmap: &MmapMut) -> &BusLayout {
        debug_assert_eq!(mmap.len(), BusLayout::SIZE);
        unsafe { &*(mmap.as_ptr() as *const BusLayout) }
    }

    fn layout(&self) -> &BusLayout {
        Self::layout_ref(&self.mmap)
    }

    // --- TMS-link-owned cells ---

    pub fn current_temperature(&self) -> f64 {
        f64::from_bits(self.layout().current_temperature_bits.load(Relaxed))
    }

    pub fn set_current_temperature(&self, value: f64) {
        self.layout()
            .current_temperature_bits
            .store(value.to_bits(), Relaxed);
    }

    pub fn current_temperature_derivative(&self) -> f64 {
        f64::from_bits(
            self.layout()
                .current_temperature_derivative_bits
                .load(Relaxed),
        )
    }

    pub fn set_current_temperature_derivative(&self, value: f64) {
        self.layout()
            .current_temperature_derivative_bits
            .store(value.to_bits(), Relaxed);
    }

    pub fn door_open(&self) -> bool {
        self.layout().door_open.load(Relaxed) != 0
    }

    pub fn set_door_open(&self, open: bool) {
        self.layout().door_open.store(open as u8, Relaxed);
    }

    pub fn oven_reported_state(&self) -> u8 {
        self.layout().oven_reported_state.load(Relaxed)
    }

    pub fn set_oven_reported_state(&self, state: u8) {
        self.layout().oven_reported_state.store(state, Relaxed);
    }

    pub fn oven_error_bitmask(&self) -> u8 {
        self.layout().oven_error_bitmask.load(Relaxed)
    }

    pub fn set_oven_error_bitmask(&self, mask: u8) {
        self.layout().oven_error_bitmask.store(mask, Relaxed);
    }

    // --- supervisor-owned cells ---

    pub fn control_state(&self) -> u8 {
        self.layout().control_state.load(Relaxed)
    }

    pub fn set_control_state(&self, state: u8) {
        self.layout().control_state.store(state, Relaxed);
    }

    pub fn desired_oven_state(&self) -> u8 {
        self.layout().desired_oven_state.load(Relaxed)
    }

    pub fn set_desired_oven_state(&self, state: u8) {
        self.layout().desired_oven_state.store(state, Relaxed);
    }

    pub fn desired_duty_cycle(&self) -> u8 {
        self.layout().desired_duty_cycle.load(Relaxed)
    }

    pub fn set_desired_duty_cycle(&self, duty: u8) {
        self.layout().desired_duty_cycle.store(duty.min(100), Relaxed);
    }

    pub fn curve_duration_s(&self) -> f64 {
        f64::from_bits(self.layout().curve_duration_bits.load(Relaxed))
    }

    pub fn set_curve_duration_s(&self, value: f64) {
        self.layout()
            .curve_duration_bits
            .store(value.to_bits(), Relaxed);
    }

    // --- events ---

    pub fn should_exit(&self) -> bool {
        self.layout().should_exit.load(Relaxed) != 0
    }

    pub fn set_should_exit(&self, value: bool) {
        self.layout().should_exit.store(value as u8, Relaxed);
    }

    pub fn should_reset(&self) -> bool {
        self.layout().should_reset.load(Relaxed) != 0
    }

    pub fn set_should_reset(&self, value: bool) {
        self.layout().should_reset.store(value as u8, Relaxed);
    }

    pub fn clear_should_reset(&self) {
        self.set_should_reset(false);
    }

    /// Requests cancellation of the run currently in progress, leaving
    /// `should_exit` untouched. Set by `ReflowController::stop`, observed
    /// and cleared by the reflow supervisor alone.
    pub fn cancel_run(&self) -> bool {
        self.layout().cancel_run.load(Relaxed) != 0
    }

    pub fn set_cancel_run(&self, value: bool) {
        self.layout().cancel_run.store(value as u8, Relaxed);
    }

    pub fn clear_cancel_run(&self) {
        self.set_cancel_run(false);
    }
}

/// Convenience for callers that just need a throwaway path in a temp
/// directory (tests, `--mock-tms` runs).
pub fn default_bus_path(run_id: &str) -> PathBuf {
    std::env::temp_dir().join(format!("reflow-bus-{run_id}.bin"))
}

// SAFETY: every field of `BusLayout` is an atomic; concurrent access
// from multiple processes mapping the same file is exactly what atomics
// are for. `MmapMut` itself is not `Sync` by default because mutation
// through a shared `&MmapMut` is normally unsound, but here all mutation
// goes through the atomics inside `BusLayout`, never through the mmap's
// own byte-slice API.
unsafe impl Sync for SharedBus {}
