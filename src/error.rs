//! Error types shared by every network operation.

use thiserror::Error;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while building, running, training or
/// persisting a network.
#[derive(Error, Debug)]
pub enum Error {
    /// A vector had a different length than the layer or unit expects.
    #[error("dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A layer was built (or decoded) without any units.
    #[error("layer has no units")]
    EmptyLayer,

    /// The network configuration cannot produce a usable network.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A dataset or label cannot be used.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The model file could not be opened, read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The model bytes are truncated or describe an inconsistent network.
    #[error("corrupt model: {0}")]
    CorruptModel(String),
}

impl Error {
    pub(crate) fn mismatch(expected: usize, actual: usize) -> Self {
        Error::DimensionMismatch { expected, actual }
    }
}

/// Fails with `DimensionMismatch` unless `actual == expected`.
pub(crate) fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::mismatch(expected, actual))
    }
}
