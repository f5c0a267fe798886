//! Versioned persisted envelope for the mutation queue.

use crate::error::{ModelError, ModelResult};
use crate::record::MutationRecord;
use serde::{Deserialize, Serialize};

/// The snapshot version this build writes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// The persisted form of the mutation queue.
///
/// The explicit version field exists so that adding or removing a
/// `MutationRecord` field later fails loudly on load instead of
/// silently deserializing garbage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Envelope version.
    pub version: u32,
    /// Queue entries in enqueue order.
    pub mutations: Vec<MutationRecord>,
}

impl QueueSnapshot {
    /// Wraps queue entries in a current-version envelope.
    pub fn new(mutations: Vec<MutationRecord>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            mutations,
        }
    }

    /// Serializes the snapshot to JSON bytes.
    pub fn encode(&self) -> ModelResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserializes a snapshot from JSON bytes, migrating older
    /// versions where possible.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnsupportedSnapshotVersion`] for versions
    /// this build does not understand.
    pub fn decode(bytes: &[u8]) -> ModelResult<Self> {
        let snapshot: QueueSnapshot = serde_json::from_slice(bytes)?;

        match snapshot.version {
            // Version 1 is current. Older entries without dead-letter
            // fields are handled by serde defaults on MutationRecord.
            SNAPSHOT_VERSION => Ok(snapshot),
            found => Err(ModelError::UnsupportedSnapshotVersion {
                found,
                current: SNAPSHOT_VERSION,
            }),
        }
    }
}
