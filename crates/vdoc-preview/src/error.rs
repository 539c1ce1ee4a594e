//! Transport error kinds.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("buffer too short: need {need} bytes, have {have}")]
    UnexpectedEof { need: usize, have: usize },

    #[error("byte count {byte_count} does not cover {height} lines of {bytes_per_line} bytes")]
    InconsistentHeader {
        byte_count: u32,
        bytes_per_line: u32,
        height: u32,
    },

    #[error("header declares {declared} pixel bytes but {actual} follow")]
    PixelCountMismatch { declared: u32, actual: usize },

    #[error("unknown pixel source tag {0}")]
    UnknownTag(u8),

    #[error("no shared buffer with key {0}")]
    UnknownBuffer(u32),
}
