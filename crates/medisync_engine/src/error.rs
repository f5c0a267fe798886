//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Per-mutation remote failures are not surfaced here; they are
/// absorbed into retry counts and `recent_errors`. These variants are
/// cycle-level failures.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A sync cycle is already executing.
    ///
    /// Scheduler-internal triggers treat this as a no-op; callers of
    /// `force_sync` see it directly.
    #[error("a sync cycle is already in progress")]
    CycleInProgress,

    /// The durable state store failed.
    #[error("state store error: {0}")]
    Store(#[from] medisync_store::StoreError),

    /// Model data could not be decoded.
    #[error("model error: {0}")]
    Model(#[from] medisync_model::ModelError),

    /// The local record store failed.
    #[error("record store error: {0}")]
    RecordStore(String),

    /// A background sync task failed to complete.
    #[error("sync task failed: {0}")]
    Task(String),
}

impl SyncError {
    /// Creates a record store error from any display-able cause.
    pub fn record_store(cause: impl std::fmt::Display) -> Self {
        Self::RecordStore(cause.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            SyncError::CycleInProgress.to_string(),
            "a sync cycle is already in progress"
        );

        let err = SyncError::record_store("row not found");
        assert!(err.to_string().contains("row not found"));
    }
}
