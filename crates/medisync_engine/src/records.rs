//! Durable record store abstraction.
//!
//! The local record store is an external collaborator; the engine only
//! needs lookup by local or remote id, remote-wins upserts, and
//! remote-id bookkeeping after a successful create.

use crate::error::SyncResult;
use chrono::{DateTime, Utc};
use medisync_model::{EntityType, LocalRecord, RemoteRecord};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Callback interface into the local durable record store.
pub trait RecordStore: Send + Sync {
    /// Looks up a record by its local identifier.
    fn get_by_local_id(&self, entity: EntityType, local_id: &str)
        -> SyncResult<Option<LocalRecord>>;

    /// Looks up a record by its remote identifier.
    fn get_by_remote_id(
        &self,
        entity: EntityType,
        remote_id: &str,
    ) -> SyncResult<Option<LocalRecord>>;

    /// Inserts or overwrites a record from its remote snapshot.
    ///
    /// Must be idempotent: applying the same snapshot twice yields the
    /// same local state as applying it once.
    fn upsert_from_remote(&self, entity: EntityType, record: &RemoteRecord) -> SyncResult<()>;

    /// Records the remote identifier assigned to a local record.
    fn set_remote_id(&self, entity: EntityType, local_id: &str, remote_id: &str) -> SyncResult<()>;
}

/// An in-memory record store for testing.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<(EntityType, String), LocalRecord>>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a local record, as the application write path would.
    pub fn insert_local(&self, entity: EntityType, record: LocalRecord) {
        self.records
            .write()
            .insert((entity, record.local_id.clone()), record);
    }

    /// Returns the number of records for `entity`.
    pub fn count(&self, entity: EntityType) -> usize {
        self.records
            .read()
            .keys()
            .filter(|(e, _)| *e == entity)
            .count()
    }
}

impl RecordStore for MemoryRecordStore {
    fn get_by_local_id(
        &self,
        entity: EntityType,
        local_id: &str,
    ) -> SyncResult<Option<LocalRecord>> {
        Ok(self
            .records
            .read()
            .get(&(entity, local_id.to_string()))
            .cloned())
    }

    fn get_by_remote_id(
        &self,
        entity: EntityType,
        remote_id: &str,
    ) -> SyncResult<Option<LocalRecord>> {
        Ok(self
            .records
            .read()
            .iter()
            .find(|((e, _), r)| *e == entity && r.remote_id.as_deref() == Some(remote_id))
            .map(|(_, r)| r.clone()))
    }

    fn upsert_from_remote(&self, entity: EntityType, record: &RemoteRecord) -> SyncResult<()> {
        let mut records = self.records.write();

        let existing_local_id = records
            .iter()
            .find(|((e, _), r)| *e == entity && r.remote_id.as_deref() == Some(&record.remote_id))
            .map(|((_, local_id), _)| local_id.clone());

        // Records first seen via pull get a local id derived from the
        // remote id, mirroring what the real store does on insert.
        let local_id = existing_local_id.unwrap_or_else(|| format!("r-{}", record.remote_id));

        records.insert(
            (entity, local_id.clone()),
            LocalRecord {
                local_id,
                remote_id: Some(record.remote_id.clone()),
                updated_at: record.updated_at,
                payload: record.payload.clone(),
            },
        );
        Ok(())
    }

    fn set_remote_id(&self, entity: EntityType, local_id: &str, remote_id: &str) -> SyncResult<()> {
        if let Some(record) = self
            .records
            .write()
            .get_mut(&(entity, local_id.to_string()))
        {
            record.remote_id = Some(remote_id.to_string());
        }
        Ok(())
    }
}
