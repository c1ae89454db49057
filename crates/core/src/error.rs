//! Error types for the quota engine.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the quota engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (bad config file, malformed target distribution).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller supplied an argument outside the accepted domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation mixed data from two different subsets.
    #[error("Subset mismatch: expected '{expected}', got '{actual}'")]
    SubsetMismatch {
        /// Subset the receiver is scoped to.
        expected: String,
        /// Subset of the offending value.
        actual: String,
    },

    /// Data error (invalid or missing data).
    #[error("Data error: {0}")]
    Data(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create a subset mismatch error.
    pub fn subset_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Error::SubsetMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
