//! Durable mutation queue.
//!
//! Wraps the in-memory [`MutationQueue`] with persistence through a
//! [`StateStore`]. Every mutation to the queue is written back as a
//! versioned snapshot; a failed write is logged and tolerated rather
//! than crashing the caller (the in-memory queue stays authoritative
//! until the next successful write).

use crate::error::SyncResult;
use chrono::{DateTime, Duration, Utc};
use medisync_model::{
    EntityType, MutationAction, MutationQueue, MutationRecord, QueueSnapshot,
};
use medisync_store::StateStore;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// State store key for the queue snapshot.
pub const QUEUE_KEY: &str = "mutation_queue";

/// The mutation queue plus its durable backing.
///
/// All queue mutations are serialized through an internal mutex; the
/// queue is the single shared resource between the application write
/// path (producer) and the sync cycle (consumer).
pub struct DurableQueue {
    inner: Mutex<MutationQueue>,
    store: Arc<dyn StateStore>,
}

impl DurableQueue {
    /// Restores the queue from durable storage.
    ///
    /// A missing key yields an empty queue. Entries keep their `synced`
    /// state so previously-delivered mutations are not redelivered.
    ///
    /// # Errors
    ///
    /// Fails if the stored snapshot cannot be read or carries an
    /// unsupported version.
    pub fn load(store: Arc<dyn StateStore>) -> SyncResult<Self> {
        let queue = match store.read(QUEUE_KEY)? {
            Some(bytes) => {
                let snapshot = QueueSnapshot::decode(&bytes)?;
                debug!(entries = snapshot.mutations.len(), "restored mutation queue");
                MutationQueue::from_records(snapshot.mutations)
            }
            None => MutationQueue::new(),
        };

        Ok(Self {
            inner: Mutex::new(queue),
            store,
        })
    }

    /// Appends a new mutation and persists the queue.
    ///
    /// Returns immediately; callers never block on network I/O here.
    pub fn enqueue(
        &self,
        entity_type: EntityType,
        action: MutationAction,
        payload: Value,
        local_id: impl Into<String>,
        remote_id: Option<String>,
        now: DateTime<Utc>,
    ) -> MutationRecord {
        let mut queue = self.inner.lock();
        let record = queue.enqueue(entity_type, action, payload, local_id, remote_id, now);
        self.persist(&queue);
        record
    }

    /// Marks an entry as synced and persists the queue.
    pub fn mark_synced(&self, id: &str, remote_id: Option<&str>) -> bool {
        let mut queue = self.inner.lock();
        let changed = queue.mark_synced(id, remote_id);
        if changed {
            self.persist(&queue);
        }
        changed
    }

    /// Records a failed attempt and persists the queue.
    pub fn record_failure(&self, id: &str, error: &str, now: DateTime<Utc>) -> Option<u32> {
        let mut queue = self.inner.lock();
        let retries = queue.record_failure(id, error, now);
        if retries.is_some() {
            self.persist(&queue);
        }
        retries
    }

    /// Dead-letters an entry and persists the queue.
    pub fn dead_letter(&self, id: &str, error: &str, now: DateTime<Utc>) -> bool {
        let mut queue = self.inner.lock();
        let changed = queue.dead_letter(id, error, now);
        if changed {
            self.persist(&queue);
        }
        changed
    }

    /// Prunes synced entries older than the retention window and
    /// persists the queue. Returns the number of entries removed.
    pub fn prune(&self, retention: Duration, now: DateTime<Utc>) -> usize {
        let mut queue = self.inner.lock();
        let removed = queue.prune(retention, now);
        if removed > 0 {
            self.persist(&queue);
        }
        removed
    }

    /// Returns up to `limit` attemptable mutations, oldest first.
    pub fn push_batch(&self, limit: usize, max_retry: u32) -> Vec<MutationRecord> {
        self.inner.lock().push_batch(limit, max_retry)
    }

    /// Returns true if any unsynced mutation targets the given record.
    pub fn has_pending_for(&self, entity_type: EntityType, local_id: &str) -> bool {
        self.inner.lock().has_pending_for(entity_type, local_id)
    }

    /// Returns the number of unsynced entries.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending_count()
    }

    /// Returns the total number of entries.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if the queue has no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Returns a clone of every entry, for diagnostics and tests.
    pub fn records(&self) -> Vec<MutationRecord> {
        self.inner.lock().records().to_vec()
    }

    /// Discards all entries, including unsynced ones, and persists.
    ///
    /// Data-loss operation; the caller is responsible for confirming.
    pub fn clear(&self) {
        let mut queue = self.inner.lock();
        queue.clear();
        self.persist(&queue);
    }

    /// Writes the queue snapshot back to the state store.
    ///
    /// Persistence failures are logged and swallowed: losing unflushed
    /// queue state on a crash is an accepted limitation, crashing the
    /// write path is not.
    fn persist(&self, queue: &MutationQueue) {
        let snapshot = QueueSnapshot::new(queue.records().to_vec());
        let bytes = match snapshot.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to encode mutation queue snapshot");
                return;
            }
        };

        if let Err(e) = self.store.write(QUEUE_KEY, &bytes) {
            warn!(error = %e, "failed to persist mutation queue");
        }
    }
}
