//! Mutation and record types.

use crate::entity::{EntityType, MutationAction};
use crate::error::{ModelError, ModelResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single pending or completed local change awaiting transmission.
///
/// The record is created the instant a local write commits, mutated in
/// place by the push phase (`retry_count`, `last_attempt_at`, `synced`,
/// `remote_id`), and destroyed only by pruning once synced and stale.
///
/// # Invariants
///
/// - `synced = true` is terminal; it is never cleared
/// - `retry_count` only increments, on failed attempts
/// - An `Update`/`Delete` needs a resolvable `remote_id` before it can
///   sync; until then attempts fail without a network call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Unique queue entry id, derived from entity, local id, and enqueue time.
    pub id: String,
    /// The collection this mutation targets.
    pub entity_type: EntityType,
    /// The kind of change.
    pub action: MutationAction,
    /// Full record snapshot at enqueue time, not a diff.
    pub payload: Value,
    /// Identifier assigned by the local record store.
    pub local_id: String,
    /// Identifier assigned by the remote service, once known.
    pub remote_id: Option<String>,
    /// When the mutation was enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// True once the remote call has succeeded. Terminal.
    pub synced: bool,
    /// Number of failed send attempts so far.
    pub retry_count: u32,
    /// Timestamp of the most recent attempt, if any.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// True if the remote permanently rejected the payload. Such
    /// mutations are never retried but remain visible as pending.
    #[serde(default)]
    pub dead_lettered: bool,
    /// Most recent failure message, for operator visibility.
    #[serde(default)]
    pub last_error: Option<String>,
}

impl MutationRecord {
    /// Creates a new unsynced mutation enqueued at `now`.
    pub fn new(
        entity_type: EntityType,
        action: MutationAction,
        payload: Value,
        local_id: impl Into<String>,
        remote_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let local_id = local_id.into();
        let id = format!(
            "{}:{}:{}",
            entity_type.as_str(),
            local_id,
            now.timestamp_millis()
        );

        Self {
            id,
            entity_type,
            action,
            payload,
            local_id,
            remote_id,
            enqueued_at: now,
            synced: false,
            retry_count: 0,
            last_attempt_at: None,
            dead_lettered: false,
            last_error: None,
        }
    }

    /// Returns true if this mutation is still awaiting a successful sync.
    ///
    /// Dead-lettered and retry-exhausted mutations count as pending so
    /// operators can see stuck entries.
    pub fn is_pending(&self) -> bool {
        !self.synced
    }

    /// Returns true if the push phase should attempt this mutation.
    pub fn is_attemptable(&self, max_retry: u32) -> bool {
        !self.synced && !self.dead_lettered && self.retry_count < max_retry
    }
}

/// A record as held by the local durable record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord {
    /// Identifier assigned by the local store.
    pub local_id: String,
    /// Last known remote identifier, if the record has ever synced.
    pub remote_id: Option<String>,
    /// Last local modification time.
    pub updated_at: DateTime<Utc>,
    /// Full record payload.
    pub payload: Value,
}

/// A record as returned by the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    /// Identifier assigned by the remote service.
    pub remote_id: String,
    /// Remote modification time.
    pub updated_at: DateTime<Utc>,
    /// Full record payload as received.
    pub payload: Value,
}

impl RemoteRecord {
    /// Parses a remote record from a JSON payload.
    ///
    /// The remote service returns records with an `id` and an ISO-8601
    /// `updated_at`; both are required.
    pub fn from_json(payload: Value) -> ModelResult<Self> {
        let remote_id = payload
            .get("id")
            .and_then(value_as_id)
            .ok_or(ModelError::MissingField("id"))?;

        let raw = payload
            .get("updated_at")
            .and_then(Value::as_str)
            .ok_or(ModelError::MissingField("updated_at"))?;

        let updated_at = DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| ModelError::InvalidTimestamp {
                field: "updated_at",
                value: raw.to_string(),
            })?;

        Ok(Self {
            remote_id,
            updated_at,
            payload,
        })
    }
}

/// Remote ids arrive as either JSON strings or integers.
fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
