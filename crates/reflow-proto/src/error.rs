//! Error type shared by the codec and message layers.

use thiserror::Error;

/// Failure modes when framing or parsing a line of the TMS wire protocol.
#[derive(Debug, Error)]
pub enum Error {
    /// A line did not parse as JSON at all.
    #[error("malformed frame: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The JSON parsed, but matched neither the status nor the log shape.
    #[error("frame matched neither status nor log schema")]
    UnknownFrameShape,

    /// A single line exceeded the maximum accepted frame size.
    #[error("frame of {0} bytes exceeds the {1} byte limit")]
    FrameTooLarge(usize, usize),

    /// The underlying I/O operation failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
