//! Offline-first synchronization engine.
//!
//! The engine keeps a local record store converging with a remote
//! authoritative service over an unreliable connection. Local writes
//! land in a durable mutation queue immediately and are delivered later;
//! remote changes are pulled incrementally and applied remote-wins.
//!
//! # Architecture
//!
//! The engine itself is synchronous. One [`SyncEngine::sync_cycle`] call
//! runs three phases in order:
//!
//! 1. **Push**: drain a batch of queued mutations, oldest first.
//!    Transient failures increment a bounded retry count; permanent
//!    rejections are dead-lettered and never retried.
//! 2. **Pull**: fetch records changed since the last successful cycle,
//!    one entity type at a time, and apply them to the record store. A
//!    failing entity type does not abort the others.
//! 3. **Prune**: drop synced queue entries past the retention window.
//!
//! [`SyncScheduler`] drives cycles from a tokio runtime: a periodic
//! timer, offline-to-online transitions, and enqueue notifications each
//! trigger a cycle on the blocking thread pool.
//!
//! Collaborators are traits: [`RemoteClient`] for the wire protocol
//! (with [`RestClient`] as the REST implementation), [`RecordStore`]
//! for the local database, and [`ConnectivityMonitor`] for network
//! awareness. Tests wire in the provided in-memory fakes.
//!
//! # Example
//!
//! ```
//! use medisync_engine::{
//!     ConnectivityMonitor, ManualConnectivity, MemoryRecordStore, MockRemoteClient,
//!     SyncConfig, SyncEngine,
//! };
//! use medisync_model::{EntityType, MutationAction};
//! use medisync_store::{MemoryStateStore, StateStore};
//! use std::sync::Arc;
//!
//! # fn main() -> medisync_engine::SyncResult<()> {
//! let engine = SyncEngine::new(
//!     SyncConfig::new(),
//!     Arc::new(MockRemoteClient::new()),
//!     Arc::new(MemoryRecordStore::new()),
//!     Arc::new(ManualConnectivity::new(true)) as Arc<dyn ConnectivityMonitor>,
//!     Arc::new(MemoryStateStore::new()) as Arc<dyn StateStore>,
//! )?;
//!
//! engine.enqueue(
//!     EntityType::Patients,
//!     MutationAction::Create,
//!     serde_json::json!({"name": "Asha"}),
//!     "1",
//!     None,
//! );
//!
//! let report = engine.sync_cycle()?;
//! assert_eq!(report.pushed, 1);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connectivity;
mod engine;
mod error;
mod queue;
mod records;
mod remote;
mod rest;
mod scheduler;

pub use config::SyncConfig;
pub use connectivity::{ConnectivityMonitor, ManualConnectivity};
pub use engine::{SyncCycleReport, SyncEngine, SyncState, LAST_SYNC_KEY};
pub use error::{SyncError, SyncResult};
pub use queue::{DurableQueue, QUEUE_KEY};
pub use records::{MemoryRecordStore, RecordStore};
pub use remote::{CreatedRecord, MockRemoteClient, RecordedCall, RemoteClient, RemoteError, RemoteErrorKind, RemoteResult};
pub use rest::{HttpClient, HttpMethod, HttpResponse, RestClient};
pub use scheduler::SyncScheduler;
