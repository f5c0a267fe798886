//! Error types for the model crate.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while decoding model data.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A required field was missing from a remote record payload.
    #[error("remote record missing field `{0}`")]
    MissingField(&'static str),

    /// A timestamp field could not be parsed as ISO-8601.
    #[error("invalid timestamp in field `{field}`: {value}")]
    InvalidTimestamp {
        /// The field that failed to parse.
        field: &'static str,
        /// The raw value.
        value: String,
    },

    /// The persisted queue snapshot carries a version this build does
    /// not understand.
    #[error("unsupported queue snapshot version {found} (current is {current})")]
    UnsupportedSnapshotVersion {
        /// The version found in the envelope.
        found: u32,
        /// The version this build writes.
        current: u32,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
