//! # MediSync Model
//!
//! Mutation queue data model and sync status types for MediSync.
//!
//! This crate provides:
//! - `EntityType` and `MutationAction` for addressing remote collections
//! - `MutationRecord` for pending local changes
//! - `MutationQueue` for the ordered in-memory mutation log
//! - `QueueSnapshot` for the versioned persisted envelope
//! - `SyncStatus` and `SyncStats` read models
//!
//! This is a pure model crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
mod error;
mod queue;
mod record;
mod snapshot;
mod status;

pub use entity::{EntityType, MutationAction};
pub use error::{ModelError, ModelResult};
pub use queue::MutationQueue;
pub use record::{LocalRecord, MutationRecord, RemoteRecord};
pub use snapshot::{QueueSnapshot, SNAPSHOT_VERSION};
pub use status::{SyncErrorEntry, SyncStats, SyncStatus};
