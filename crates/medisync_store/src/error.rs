//! Error types for state store operations.

use std::io;
use thiserror::Error;

/// Result type for state store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A key contained characters the backend cannot represent.
    #[error("invalid state store key: {0}")]
    InvalidKey(String),

    /// The backend rejected the write (used by test backends to
    /// simulate persistence failures).
    #[error("write rejected: {0}")]
    WriteRejected(String),
}
