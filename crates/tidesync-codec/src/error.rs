//! Error types for the compression codec

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    /// The operation did not finish within the configured ceiling
    #[error("compression timed out after {0:?}")]
    Timeout(Duration),

    /// The encoder or decoder failed (e.g. corrupt input)
    #[error("codec I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The decoded payload would exceed the configured ceiling
    #[error("decompressed payload exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// The blocking task panicked or was cancelled
    #[error("codec task failed: {0}")]
    Join(String),
}
