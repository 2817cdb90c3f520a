//! Storage error types

use thiserror::Error;

/// Errors raised by token store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure while reading or writing the store
    #[error("token store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted document could not be parsed or written
    #[error("token store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
