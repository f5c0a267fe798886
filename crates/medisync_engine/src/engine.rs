//! Sync engine state machine.

use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::queue::DurableQueue;
use crate::records::RecordStore;
use crate::remote::{RemoteClient, RemoteError};
use chrono::{DateTime, Duration as TimeDelta, Utc};
use medisync_model::{
    EntityType, MutationAction, MutationRecord, RemoteRecord, SyncErrorEntry, SyncStats,
    SyncStatus,
};
use medisync_store::StateStore;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// State store key for the last-successful-sync watermark.
pub const LAST_SYNC_KEY: &str = "last_sync_at";

/// Failure message for mutations blocked on remote-id assignment.
const NO_REMOTE_ID: &str = "remote id not yet assigned; waiting for create to complete";

/// The phase a sync cycle is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No cycle is executing.
    Idle,
    /// Draining the mutation queue to the remote service.
    Pushing,
    /// Fetching and applying remote deltas.
    Pulling,
    /// Removing stale synced queue entries.
    Pruning,
}

impl SyncState {
    /// Returns true if a cycle is executing.
    pub fn is_active(&self) -> bool {
        !matches!(self, SyncState::Idle)
    }
}

/// Result of one completed sync cycle.
#[derive(Debug, Clone)]
pub struct SyncCycleReport {
    /// Mutations successfully pushed.
    pub pushed: u64,
    /// Mutations that failed this cycle (retried or dead-lettered).
    pub push_failures: u64,
    /// Remote records pulled and applied.
    pub pulled: u64,
    /// Conflicts resolved remote-wins during pull.
    pub conflicts_resolved: u64,
    /// Queue entries removed by pruning.
    pub pruned: usize,
    /// Entity types whose pull failed this cycle. One failing entity
    /// does not abort the others.
    pub pull_errors: Vec<(EntityType, RemoteError)>,
    /// Wall-clock duration of the cycle.
    pub duration: std::time::Duration,
}

/// The sync engine reconciles the local record store with the remote
/// authoritative service.
///
/// One cycle runs push (drain queue), pull (apply remote deltas since
/// the last watermark), then prune. At most one cycle executes at a
/// time; concurrent attempts fail fast with
/// [`SyncError::CycleInProgress`] rather than queueing.
///
/// Collaborators are injected so the composition root owns wiring and
/// tests can substitute fakes.
pub struct SyncEngine<R: RemoteClient, S: RecordStore> {
    config: SyncConfig,
    remote: Arc<R>,
    records: Arc<S>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    store: Arc<dyn StateStore>,
    queue: DurableQueue,
    state: RwLock<SyncState>,
    in_progress: AtomicBool,
    last_sync_at: RwLock<Option<DateTime<Utc>>>,
    recent_errors: Mutex<VecDeque<SyncErrorEntry>>,
    stats: RwLock<SyncStats>,
    kick: Notify,
}

impl<R: RemoteClient, S: RecordStore> SyncEngine<R, S> {
    /// Creates a new engine, restoring the queue and watermark from
    /// durable storage.
    ///
    /// # Errors
    ///
    /// Fails if the persisted queue cannot be restored.
    pub fn new(
        config: SyncConfig,
        remote: Arc<R>,
        records: Arc<S>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        store: Arc<dyn StateStore>,
    ) -> SyncResult<Self> {
        let queue = DurableQueue::load(Arc::clone(&store))?;
        let last_sync_at = Self::load_watermark(store.as_ref())?;

        Ok(Self {
            config,
            remote,
            records,
            connectivity,
            store,
            queue,
            state: RwLock::new(SyncState::Idle),
            in_progress: AtomicBool::new(false),
            last_sync_at: RwLock::new(last_sync_at),
            recent_errors: Mutex::new(VecDeque::new()),
            stats: RwLock::new(SyncStats::default()),
            kick: Notify::new(),
        })
    }

    /// Enqueues a local mutation for transmission.
    ///
    /// The mutation is persisted before this returns; the caller never
    /// blocks on network I/O. If the engine is online and no cycle is
    /// running, an asynchronous sync attempt is requested.
    pub fn enqueue(
        &self,
        entity_type: EntityType,
        action: MutationAction,
        payload: serde_json::Value,
        local_id: impl Into<String>,
        remote_id: Option<String>,
    ) -> MutationRecord {
        let record = self
            .queue
            .enqueue(entity_type, action, payload, local_id, remote_id, Utc::now());

        debug!(
            mutation = %record.id,
            action = %record.action,
            "enqueued mutation"
        );

        if self.connectivity.is_online() && !self.in_progress.load(Ordering::SeqCst) {
            self.kick.notify_one();
        }

        record
    }

    /// Resolves when a producer has requested a sync attempt.
    ///
    /// Used by the scheduler; at most one pending request is retained.
    pub async fn sync_requested(&self) {
        self.kick.notified().await;
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the current phase.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Returns a point-in-time status snapshot, recomputed from the
    /// live queue and collaborators.
    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            is_online: self.connectivity.is_online(),
            last_sync_at: *self.last_sync_at.read(),
            pending_count: self.queue.pending_count(),
            in_progress: self.in_progress.load(Ordering::SeqCst),
            recent_errors: self.recent_errors.lock().iter().cloned().collect(),
        }
    }

    /// Returns cumulative counters.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the durable mutation queue.
    pub fn queue(&self) -> &DurableQueue {
        &self.queue
    }

    /// Returns the connectivity monitor.
    pub fn connectivity(&self) -> Arc<dyn ConnectivityMonitor> {
        Arc::clone(&self.connectivity)
    }

    /// Discards all pending mutations, including unsynced ones.
    ///
    /// Administrative escape hatch; data loss is the caller's
    /// responsibility to confirm.
    pub fn clear_queue(&self) {
        warn!(discarded = self.queue.len(), "clearing mutation queue");
        self.queue.clear();
    }

    /// Runs one complete sync cycle: push, pull, prune.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CycleInProgress`] if another cycle holds
    /// the re-entrancy guard, or a cycle-level error if a local
    /// collaborator fails. Per-mutation remote failures and per-entity
    /// pull failures are absorbed into the report, not returned.
    pub fn sync_cycle(&self) -> SyncResult<SyncCycleReport> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::CycleInProgress);
        }

        let result = self.run_cycle();

        *self.state.write() = SyncState::Idle;
        self.in_progress.store(false, Ordering::SeqCst);

        match &result {
            Ok(report) => {
                let mut stats = self.stats.write();
                stats.cycles_completed += 1;
                stats.mutations_pushed += report.pushed;
                stats.records_pulled += report.pulled;
                stats.conflicts_resolved += report.conflicts_resolved;
                stats.last_error = None;
                drop(stats);

                info!(
                    pushed = report.pushed,
                    pulled = report.pulled,
                    pruned = report.pruned,
                    failures = report.push_failures,
                    pull_errors = report.pull_errors.len(),
                    "sync cycle completed"
                );
            }
            Err(e) => {
                self.stats.write().last_error = Some(e.to_string());
                warn!(error = %e, "sync cycle failed");
            }
        }

        result
    }

    /// Like [`sync_cycle`](Self::sync_cycle), but an already-running
    /// cycle is a no-op rather than an error. Scheduler-driven triggers
    /// are fire-and-forget, so overlap is not worth reporting.
    pub fn try_sync(&self) -> SyncResult<Option<SyncCycleReport>> {
        match self.sync_cycle() {
            Ok(report) => Ok(Some(report)),
            Err(SyncError::CycleInProgress) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn run_cycle(&self) -> SyncResult<SyncCycleReport> {
        let started = Instant::now();
        let cycle_start = Utc::now();

        *self.state.write() = SyncState::Pushing;
        let (pushed, push_failures) = self.push_phase()?;

        *self.state.write() = SyncState::Pulling;
        let since = *self.last_sync_at.read();
        let (pulled, conflicts_resolved, pull_errors) = self.pull_phase(since)?;

        *self.state.write() = SyncState::Pruning;
        let retention =
            TimeDelta::from_std(self.config.retention).unwrap_or(TimeDelta::MAX);
        let pruned = self.queue.prune(retention, Utc::now());

        // Advance the watermark only on a fully clean pull. A failed
        // entity would otherwise have its deltas skipped forever;
        // re-pulling is safe because application is idempotent.
        if pull_errors.is_empty() {
            self.set_watermark(cycle_start);
        }

        Ok(SyncCycleReport {
            pushed,
            push_failures,
            pulled,
            conflicts_resolved,
            pruned,
            pull_errors,
            duration: started.elapsed(),
        })
    }

    /// Push phase: drain one batch of attemptable mutations, oldest
    /// first so an entity's `Update` never precedes its `Create`.
    fn push_phase(&self) -> SyncResult<(u64, u64)> {
        let batch = self
            .queue
            .push_batch(self.config.push_batch_size, self.config.max_retry);

        if batch.is_empty() {
            return Ok((0, 0));
        }

        debug!(batch = batch.len(), "pushing mutations");

        let mut pushed = 0u64;
        let mut failures = 0u64;
        for mutation in &batch {
            if self.push_one(mutation)? {
                pushed += 1;
            } else {
                failures += 1;
            }
        }

        Ok((pushed, failures))
    }

    /// Attempts one mutation. Returns whether it synced; remote
    /// failures are recorded on the queue entry, local collaborator
    /// failures propagate.
    fn push_one(&self, mutation: &MutationRecord) -> SyncResult<bool> {
        let entity = mutation.entity_type;

        if mutation.action == MutationAction::Create {
            return match self.remote.create(entity, &mutation.payload) {
                Ok(created) => {
                    self.queue.mark_synced(&mutation.id, Some(&created.remote_id));
                    // Later Update/Delete mutations for this record
                    // resolve their remote id through the record store.
                    self.records
                        .set_remote_id(entity, &mutation.local_id, &created.remote_id)?;
                    debug!(mutation = %mutation.id, remote_id = %created.remote_id, "created remotely");
                    Ok(true)
                }
                Err(err) => {
                    self.note_remote_failure(mutation, &err);
                    Ok(false)
                }
            };
        }

        // Update and Delete need a remote id, either carried on the
        // mutation or resolvable from the local record.
        let remote_id = match &mutation.remote_id {
            Some(id) => Some(id.clone()),
            None => self
                .records
                .get_by_local_id(entity, &mutation.local_id)?
                .and_then(|r| r.remote_id),
        };

        let Some(remote_id) = remote_id else {
            // Not a permanent failure: an in-flight Create for the same
            // record may assign the id before the next cycle. Counts as
            // a retry but makes no network call.
            let now = Utc::now();
            let retries = self
                .queue
                .record_failure(&mutation.id, NO_REMOTE_ID, now)
                .unwrap_or(mutation.retry_count + 1);
            self.push_recent_error(&mutation.id, NO_REMOTE_ID, now, retries);
            debug!(mutation = %mutation.id, "deferred: no remote id yet");
            return Ok(false);
        };

        let result = if mutation.action == MutationAction::Update {
            self.remote.update(entity, &remote_id, &mutation.payload)
        } else {
            self.remote.delete(entity, &remote_id)
        };

        match result {
            Ok(()) => {
                self.queue.mark_synced(&mutation.id, Some(&remote_id));
                debug!(mutation = %mutation.id, "synced");
                Ok(true)
            }
            Err(err) => {
                self.note_remote_failure(mutation, &err);
                Ok(false)
            }
        }
    }

    /// Pull phase: fetch and apply remote deltas per entity type. A
    /// failing entity type is reported and skipped, not fatal.
    fn pull_phase(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> SyncResult<(u64, u64, Vec<(EntityType, RemoteError)>)> {
        let mut pulled = 0u64;
        let mut conflicts = 0u64;
        let mut errors = Vec::new();

        for entity in EntityType::ALL {
            let records = match self.remote.list_since(entity, since) {
                Ok(records) => records,
                Err(err) => {
                    warn!(entity = %entity, error = %err, "pull failed for entity type");
                    errors.push((entity, err));
                    continue;
                }
            };

            for record in &records {
                if self.apply_remote(entity, record)? {
                    conflicts += 1;
                }
                pulled += 1;
            }
        }

        Ok((pulled, conflicts, errors))
    }

    /// Applies one remote record locally. Returns true if this
    /// resolved a conflict (remote overwrote a newer unsynced local
    /// edit).
    fn apply_remote(&self, entity: EntityType, record: &RemoteRecord) -> SyncResult<bool> {
        let local = self.records.get_by_remote_id(entity, &record.remote_id)?;

        let conflict = match &local {
            // A conflict needs both sides changed: local strictly newer
            // AND its change still pending in the queue. Resolution is
            // remote-wins either way; the distinction is observability.
            Some(local) => {
                local.updated_at > record.updated_at
                    && self.queue.has_pending_for(entity, &local.local_id)
            }
            None => false,
        };

        if conflict {
            info!(
                entity = %entity,
                remote_id = %record.remote_id,
                "conflict: remote record overwrites newer unsynced local edit"
            );
        }

        self.records.upsert_from_remote(entity, record)?;
        Ok(conflict)
    }

    fn note_remote_failure(&self, mutation: &MutationRecord, err: &RemoteError) {
        let now = Utc::now();
        let message = err.to_string();

        if err.is_transient() {
            let retries = self
                .queue
                .record_failure(&mutation.id, &message, now)
                .unwrap_or(mutation.retry_count + 1);
            self.push_recent_error(&mutation.id, &message, now, retries);

            if retries >= self.config.max_retry {
                warn!(
                    mutation = %mutation.id,
                    retries,
                    "mutation parked after exhausting retries; operator attention needed"
                );
            } else {
                debug!(mutation = %mutation.id, retries, error = %err, "push attempt failed");
            }
        } else {
            self.queue.dead_letter(&mutation.id, &message, now);
            self.stats.write().dead_lettered += 1;
            self.push_recent_error(&mutation.id, &message, now, mutation.retry_count);
            warn!(mutation = %mutation.id, error = %err, "mutation dead-lettered");
        }
    }

    fn push_recent_error(
        &self,
        mutation_id: &str,
        error: &str,
        timestamp: DateTime<Utc>,
        retry_count: u32,
    ) {
        let mut errors = self.recent_errors.lock();
        errors.push_back(SyncErrorEntry {
            mutation_id: mutation_id.to_string(),
            error: error.to_string(),
            timestamp,
            retry_count,
        });
        while errors.len() > self.config.recent_error_cap {
            errors.pop_front();
        }
    }

    fn load_watermark(store: &dyn StateStore) -> SyncResult<Option<DateTime<Utc>>> {
        let Some(bytes) = store.read(LAST_SYNC_KEY)? else {
            return Ok(None);
        };

        let raw = String::from_utf8_lossy(&bytes);
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(t) => Ok(Some(t.with_timezone(&Utc))),
            Err(e) => {
                // A corrupt watermark only costs a wider pull window.
                warn!(error = %e, "ignoring unparseable last-sync watermark");
                Ok(None)
            }
        }
    }

    fn set_watermark(&self, at: DateTime<Utc>) {
        *self.last_sync_at.write() = Some(at);
        let encoded = at.to_rfc3339();
        if let Err(e) = self.store.write(LAST_SYNC_KEY, encoded.as_bytes()) {
            warn!(error = %e, "failed to persist last-sync watermark");
        }
    }
}
