//! Errors from creating or attaching to the shared-state bus.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error opening bus file {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bus file {path:?} is {actual} bytes, expected {expected}")]
    WrongSize {
        path: std::path::PathBuf,
        actual: u64,
        expected: u64,
    },

    #[error("bus file {path:?} has magic {actual:#x}, expected {expected:#x}; not a reflow bus file")]
    BadMagic {
        path: std::path::PathBuf,
        actual: u64,
        expected: u64,
    },

    #[error("bus file {path:?} has layout version {actual}, this binary expects {expected}")]
    VersionMismatch {
        path: std::path::PathBuf,
        actual: u32,
        expected: u32,
    },
}
