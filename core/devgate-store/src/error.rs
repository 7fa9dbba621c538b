//! Error types for the device store.

use thiserror::Error;

/// Device store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request carried no usable device identifier.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The durable write could not complete. In-memory state was left untouched.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Filesystem error outside of a write (e.g. opening the state directory).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
