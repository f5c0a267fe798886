//! # MediSync Store
//!
//! Durable key-value state store trait and backends for MediSync.
//!
//! The sync engine persists two things: the serialized mutation queue
//! and the last-successful-sync watermark. Both go through the
//! [`StateStore`] trait so the engine never touches the filesystem
//! directly.
//!
//! ## Design Principles
//!
//! - Stores are opaque byte maps keyed by short stable names
//! - Writes are atomic per key (readers never observe a torn value)
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`MemoryStateStore`] - For testing and ephemeral state
//! - [`FileStateStore`] - One file per key, atomic via temp + rename

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StoreError, StoreResult};
pub use file::FileStateStore;
pub use memory::MemoryStateStore;
pub use store::StateStore;
