//! The ordered in-memory mutation log.

use crate::entity::{EntityType, MutationAction};
use crate::record::MutationRecord;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

/// An ordered log of pending local mutations.
///
/// The queue is append-only during normal operation. Entries are marked
/// synced in place and removed only by pruning, which never touches
/// unsynced entries. Durability is layered on top by the engine; this
/// type is pure bookkeeping.
///
/// # Invariants
///
/// - Entries are kept in `enqueued_at` order
/// - `mark_synced` is terminal for an entry
/// - `prune` removes only synced entries older than the retention window
#[derive(Debug, Clone, Default)]
pub struct MutationQueue {
    entries: Vec<MutationRecord>,
}

impl MutationQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Restores a queue from previously persisted records.
    ///
    /// Entries keep their `synced` state so already-delivered mutations
    /// are not redelivered after a restart.
    pub fn from_records(mut entries: Vec<MutationRecord>) -> Self {
        entries.sort_by(|a, b| a.enqueued_at.cmp(&b.enqueued_at));
        Self { entries }
    }

    /// Appends a new mutation and returns it.
    ///
    /// The entry id is derived from entity, local id, and enqueue time;
    /// a numeric suffix disambiguates same-millisecond enqueues for the
    /// same record.
    pub fn enqueue(
        &mut self,
        entity_type: EntityType,
        action: MutationAction,
        payload: Value,
        local_id: impl Into<String>,
        remote_id: Option<String>,
        now: DateTime<Utc>,
    ) -> MutationRecord {
        let mut record = MutationRecord::new(entity_type, action, payload, local_id, remote_id, now);

        let mut suffix = 0u32;
        let base = record.id.clone();
        while self.entries.iter().any(|e| e.id == record.id) {
            suffix += 1;
            record.id = format!("{base}-{suffix}");
        }

        self.entries.push(record.clone());
        record
    }

    /// Returns all entries in enqueue order.
    pub fn records(&self) -> &[MutationRecord] {
        &self.entries
    }

    /// Returns the entry with the given id, if present.
    pub fn get(&self, id: &str) -> Option<&MutationRecord> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Returns up to `limit` attemptable mutations, oldest first.
    ///
    /// Attemptable means unsynced, not dead-lettered, and under the
    /// retry bound. Oldest-first ordering preserves causal order within
    /// an entity, so an `Update` is never attempted before its `Create`.
    pub fn push_batch(&self, limit: usize, max_retry: u32) -> Vec<MutationRecord> {
        self.entries
            .iter()
            .filter(|e| e.is_attemptable(max_retry))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Marks an entry as synced, recording the remote id if one was
    /// assigned. Returns false if the id is unknown.
    pub fn mark_synced(&mut self, id: &str, remote_id: Option<&str>) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.synced = true;
                entry.last_error = None;
                if let Some(remote_id) = remote_id {
                    entry.remote_id = Some(remote_id.to_string());
                }
                true
            }
            None => false,
        }
    }

    /// Records a failed attempt, bumping the retry count.
    ///
    /// Returns the new retry count, or `None` if the id is unknown.
    pub fn record_failure(&mut self, id: &str, error: &str, now: DateTime<Utc>) -> Option<u32> {
        let entry = self.entries.iter_mut().find(|e| e.id == id)?;
        entry.retry_count += 1;
        entry.last_attempt_at = Some(now);
        entry.last_error = Some(error.to_string());
        Some(entry.retry_count)
    }

    /// Moves an entry to the dead-letter state after a permanent
    /// rejection. The entry stays in the queue and in `pending_count`
    /// but is never retried. Returns false if the id is unknown.
    pub fn dead_letter(&mut self, id: &str, error: &str, now: DateTime<Utc>) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.dead_lettered = true;
                entry.last_attempt_at = Some(now);
                entry.last_error = Some(error.to_string());
                true
            }
            None => false,
        }
    }

    /// Removes synced entries older than the retention window.
    ///
    /// Unsynced entries are never removed regardless of age or retry
    /// count. Returns the number of entries removed.
    pub fn prune(&mut self, retention: Duration, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.synced && now - e.enqueued_at > retention));
        before - self.entries.len()
    }

    /// Returns true if any unsynced mutation targets the given record.
    ///
    /// Used by conflict detection: a local record counts as "pending"
    /// while the queue still holds an undelivered change for it.
    pub fn has_pending_for(&self, entity_type: EntityType, local_id: &str) -> bool {
        self.entries
            .iter()
            .any(|e| !e.synced && e.entity_type == entity_type && e.local_id == local_id)
    }

    /// Returns the number of unsynced entries, including dead-lettered
    /// and retry-exhausted ones.
    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_pending()).count()
    }

    /// Returns the total number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the queue has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discards all entries, including unsynced ones.
    ///
    /// This is the administrative escape hatch and loses data; callers
    /// are expected to confirm before invoking it.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    fn queue_with(n: usize) -> MutationQueue {
        let mut queue = MutationQueue::new();
        for i in 0..n {
            queue.enqueue(
                EntityType::Patients,
                MutationAction::Create,
                json!({"i": i}),
                format!("{i}"),
                None,
                at(i as i64 * 1_000),
            );
        }
        queue
    }

    #[test]
    fn enqueue_preserves_order_and_uniqueness() {
        let mut queue = MutationQueue::new();

        let a = queue.enqueue(
            EntityType::Sales,
            MutationAction::Create,
            json!({}),
            "7",
            None,
            at(500),
        );
        // Same record mutated twice within the same millisecond.
        let b = queue.enqueue(
            EntityType::Sales,
            MutationAction::Update,
            json!({}),
            "7",
            None,
            at(500),
        );

        assert_ne!(a.id, b.id);
        assert_eq!(b.id, format!("{}-1", a.id));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.records()[0].id, a.id);
    }

    #[test]
    fn push_batch_is_oldest_first_and_bounded() {
        let queue = queue_with(15);

        let batch = queue.push_batch(10, 3);
        assert_eq!(batch.len(), 10);
        assert_eq!(batch[0].local_id, "0");
        assert_eq!(batch[9].local_id, "9");
    }

    #[test]
    fn push_batch_skips_exhausted_and_dead_entries() {
        let mut queue = queue_with(3);
        let ids: Vec<String> = queue.records().iter().map(|e| e.id.clone()).collect();

        for _ in 0..3 {
            queue.record_failure(&ids[0], "network down", at(10_000));
        }
        queue.dead_letter(&ids[1], "validation failed", at(10_000));

        let batch = queue.push_batch(10, 3);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, ids[2]);

        // Both skipped entries still count as pending.
        assert_eq!(queue.pending_count(), 3);
    }

    #[test]
    fn mark_synced_is_terminal_and_records_remote_id() {
        let mut queue = queue_with(1);
        let id = queue.records()[0].id.clone();

        assert!(queue.mark_synced(&id, Some("srv-1")));
        let entry = queue.get(&id).unwrap();
        assert!(entry.synced);
        assert_eq!(entry.remote_id.as_deref(), Some("srv-1"));
        assert_eq!(queue.pending_count(), 0);

        assert!(!queue.mark_synced("no-such-id", None));
    }

    #[test]
    fn record_failure_bumps_retry_count() {
        let mut queue = queue_with(1);
        let id = queue.records()[0].id.clone();

        assert_eq!(queue.record_failure(&id, "timeout", at(2_000)), Some(1));
        assert_eq!(queue.record_failure(&id, "timeout", at(3_000)), Some(2));

        let entry = queue.get(&id).unwrap();
        assert_eq!(entry.retry_count, 2);
        assert_eq!(entry.last_attempt_at, Some(at(3_000)));
        assert_eq!(entry.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn prune_never_removes_unsynced_entries() {
        let mut queue = queue_with(4);
        let ids: Vec<String> = queue.records().iter().map(|e| e.id.clone()).collect();

        queue.mark_synced(&ids[0], None);
        queue.mark_synced(&ids[1], None);
        // Exhaust retries on an old unsynced entry; it must survive.
        for _ in 0..5 {
            queue.record_failure(&ids[2], "down", at(10_000));
        }

        let day = Duration::hours(24);
        let removed = queue.prune(day, at(0) + day + Duration::seconds(30));

        assert_eq!(removed, 2);
        assert_eq!(queue.len(), 2);
        assert!(queue.get(&ids[2]).is_some());
        assert!(queue.get(&ids[3]).is_some());
    }

    #[test]
    fn prune_keeps_recent_synced_entries() {
        let mut queue = queue_with(1);
        let id = queue.records()[0].id.clone();
        queue.mark_synced(&id, None);

        let removed = queue.prune(Duration::hours(24), at(3_600_000));
        assert_eq!(removed, 0);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn has_pending_for_tracks_unsynced_changes() {
        let mut queue = MutationQueue::new();
        let record = queue.enqueue(
            EntityType::Inventory,
            MutationAction::Update,
            json!({}),
            "5",
            Some("srv-5".into()),
            at(0),
        );

        assert!(queue.has_pending_for(EntityType::Inventory, "5"));
        assert!(!queue.has_pending_for(EntityType::Patients, "5"));
        assert!(!queue.has_pending_for(EntityType::Inventory, "6"));

        queue.mark_synced(&record.id, None);
        assert!(!queue.has_pending_for(EntityType::Inventory, "5"));
    }

    #[test]
    fn from_records_restores_order() {
        let mut queue = queue_with(3);
        let ids: Vec<String> = queue.records().iter().map(|e| e.id.clone()).collect();
        queue.mark_synced(&ids[1], None);

        let mut shuffled = queue.records().to_vec();
        shuffled.reverse();

        let restored = MutationQueue::from_records(shuffled);
        assert_eq!(restored.records()[0].id, ids[0]);
        assert_eq!(restored.pending_count(), 2);
        assert!(restored.get(&ids[1]).unwrap().synced);
    }

    #[test]
    fn clear_discards_everything() {
        let mut queue = queue_with(3);
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.pending_count(), 0);
    }
}
