//! Sync status and statistics read models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recent per-mutation failure, kept for operator visibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncErrorEntry {
    /// The queue entry that failed.
    pub mutation_id: String,
    /// The failure message.
    pub error: String,
    /// When the failure happened.
    pub timestamp: DateTime<Utc>,
    /// The entry's retry count after this failure.
    pub retry_count: u32,
}

/// A point-in-time view of the sync engine, recomputed on every call.
///
/// Derived from the live queue, connectivity monitor, and the engine's
/// in-progress flag; never persisted independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Current connectivity state.
    pub is_online: bool,
    /// Timestamp of the most recent fully-completed cycle, if any.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Number of unsynced mutations, including stuck ones.
    pub pending_count: usize,
    /// Whether a sync cycle is currently executing.
    pub in_progress: bool,
    /// Bounded list of recent per-mutation failures, newest last.
    pub recent_errors: Vec<SyncErrorEntry>,
}

/// Cumulative counters about sync activity.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Sync cycles that ran to completion.
    pub cycles_completed: u64,
    /// Mutations successfully pushed.
    pub mutations_pushed: u64,
    /// Remote records pulled and applied.
    pub records_pulled: u64,
    /// Conflicts resolved remote-wins during pull.
    pub conflicts_resolved: u64,
    /// Mutations moved to the dead-letter state.
    pub dead_lettered: u64,
    /// Most recent cycle-level error, if the last cycle failed.
    pub last_error: Option<String>,
}
