//! Remote service client abstraction.

use chrono::{DateTime, Utc};
use medisync_model::{EntityType, RemoteRecord};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// How a remote call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// The request never reached the server (DNS, refused, reset).
    Network,
    /// The request exceeded the configured timeout.
    Timeout,
    /// The server failed (5xx).
    Server {
        /// HTTP status code.
        status: u16,
    },
    /// The server rejected the payload (4xx other than 408/429).
    /// The request can never succeed as-is; do not retry.
    Rejected {
        /// HTTP status code.
        status: u16,
    },
}

/// A failed remote call.
#[derive(Debug, Clone, Error)]
#[error("remote call failed ({kind:?}): {message}")]
pub struct RemoteError {
    /// Failure classification.
    pub kind: RemoteErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl RemoteError {
    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Network,
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Timeout,
            message: message.into(),
        }
    }

    /// Creates an error from an HTTP status code.
    ///
    /// 408 and 429 are transient despite being 4xx; other 4xx are
    /// permanent rejections, 5xx are transient server failures.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            408 | 429 => RemoteErrorKind::Timeout,
            500..=599 => RemoteErrorKind::Server { status },
            _ => RemoteErrorKind::Rejected { status },
        };
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns true if retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self.kind, RemoteErrorKind::Rejected { .. })
    }
}

/// A record created on the remote service.
#[derive(Debug, Clone)]
pub struct CreatedRecord {
    /// The identifier the remote service assigned.
    pub remote_id: String,
    /// The record payload as stored remotely.
    pub payload: Value,
}

/// A client for the remote authoritative service.
///
/// This trait abstracts the wire protocol, allowing different
/// implementations (REST over any HTTP library, or a mock for tests).
/// Implementations apply the configured per-request timeout; a timed
/// out call surfaces as [`RemoteErrorKind::Timeout`].
pub trait RemoteClient: Send + Sync {
    /// Creates a record remotely, returning the assigned id.
    fn create(&self, entity: EntityType, payload: &Value) -> RemoteResult<CreatedRecord>;

    /// Updates the record with the given remote id.
    fn update(&self, entity: EntityType, remote_id: &str, payload: &Value) -> RemoteResult<()>;

    /// Deletes the record with the given remote id.
    fn delete(&self, entity: EntityType, remote_id: &str) -> RemoteResult<()>;

    /// Lists records changed at or after `since`, or all records when
    /// no prior sync has completed.
    fn list_since(
        &self,
        entity: EntityType,
        since: Option<DateTime<Utc>>,
    ) -> RemoteResult<Vec<RemoteRecord>>;
}

/// A call observed by [`MockRemoteClient`], for assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    /// A create call.
    Create(EntityType, String),
    /// An update call with the resolved remote id.
    Update(EntityType, String),
    /// A delete call with the resolved remote id.
    Delete(EntityType, String),
    /// A list call.
    List(EntityType),
}

#[derive(Default)]
struct MockState {
    next_remote_id: u64,
    create_failures: VecDeque<RemoteError>,
    update_failures: VecDeque<RemoteError>,
    delete_failures: VecDeque<RemoteError>,
    list_failures: HashMap<EntityType, VecDeque<RemoteError>>,
    list_responses: HashMap<EntityType, Vec<RemoteRecord>>,
    calls: Vec<RecordedCall>,
}

/// A mock remote client for testing.
///
/// By default every call succeeds: creates are assigned sequential
/// `srv-N` ids and lists return nothing. Failures can be scripted per
/// operation and are consumed in order.
#[derive(Default)]
pub struct MockRemoteClient {
    state: Mutex<MockState>,
}

impl MockRemoteClient {
    /// Creates a mock where every call succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the next create call to fail with `error`.
    pub fn fail_next_create(&self, error: RemoteError) {
        self.state.lock().create_failures.push_back(error);
    }

    /// Scripts the next update call to fail with `error`.
    pub fn fail_next_update(&self, error: RemoteError) {
        self.state.lock().update_failures.push_back(error);
    }

    /// Scripts the next delete call to fail with `error`.
    pub fn fail_next_delete(&self, error: RemoteError) {
        self.state.lock().delete_failures.push_back(error);
    }

    /// Scripts the next list call for `entity` to fail with `error`.
    pub fn fail_next_list(&self, entity: EntityType, error: RemoteError) {
        self.state
            .lock()
            .list_failures
            .entry(entity)
            .or_default()
            .push_back(error);
    }

    /// Sets the records returned by list calls for `entity`.
    pub fn set_list_response(&self, entity: EntityType, records: Vec<RemoteRecord>) {
        self.state.lock().list_responses.insert(entity, records);
    }

    /// Returns every call made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Returns the number of create calls made for `entity`.
    pub fn create_calls(&self, entity: EntityType) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, RecordedCall::Create(e, _) if *e == entity))
            .count()
    }

    /// Returns the number of update calls made for `entity`.
    pub fn update_calls(&self, entity: EntityType) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, RecordedCall::Update(e, _) if *e == entity))
            .count()
    }
}

impl RemoteClient for MockRemoteClient {
    fn create(&self, entity: EntityType, payload: &Value) -> RemoteResult<CreatedRecord> {
        let mut state = self.state.lock();
        state
            .calls
            .push(RecordedCall::Create(entity, payload.to_string()));

        if let Some(error) = state.create_failures.pop_front() {
            return Err(error);
        }

        state.next_remote_id += 1;
        Ok(CreatedRecord {
            remote_id: format!("srv-{}", state.next_remote_id),
            payload: payload.clone(),
        })
    }

    fn update(&self, entity: EntityType, remote_id: &str, _payload: &Value) -> RemoteResult<()> {
        let mut state = self.state.lock();
        state
            .calls
            .push(RecordedCall::Update(entity, remote_id.to_string()));

        match state.update_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn delete(&self, entity: EntityType, remote_id: &str) -> RemoteResult<()> {
        let mut state = self.state.lock();
        state
            .calls
            .push(RecordedCall::Delete(entity, remote_id.to_string()));

        match state.delete_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn list_since(
        &self,
        entity: EntityType,
        _since: Option<DateTime<Utc>>,
    ) -> RemoteResult<Vec<RemoteRecord>> {
        let mut state = self.state.lock();
        state.calls.push(RecordedCall::List(entity));

        if let Some(error) = state
            .list_failures
            .get_mut(&entity)
            .and_then(|queue| queue.pop_front())
        {
            return Err(error);
        }

        Ok(state.list_responses.get(&entity).cloned().unwrap_or_default())
    }
}
