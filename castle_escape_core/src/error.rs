//! Error types for the castle escape crate

use thiserror::Error;

/// Main error type for the castle escape crate
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported Q-table format version {found} (expected {expected})")]
    UnsupportedFormatVersion { found: u32, expected: u32 },
}

/// Convenience type alias for Results using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            message: message.into(),
        }
    }

    pub(crate) fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            operation: operation.into(),
            source,
        }
    }
}
