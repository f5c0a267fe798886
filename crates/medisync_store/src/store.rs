//! State store trait definition.

use crate::error::StoreResult;

/// A durable key-value store for small sync-engine state blobs.
///
/// Backends are **opaque byte maps**. The engine owns all format
/// interpretation; backends do not understand snapshots or watermarks.
///
/// # Invariants
///
/// - `read` returns exactly the bytes of the most recent `write` for
///   that key, or `None` if the key was never written or was removed
/// - `write` is atomic per key: a concurrent reader or a crash never
///   observes a partially written value
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::MemoryStateStore`] - For testing
/// - [`super::FileStateStore`] - For persistent state
pub trait StateStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs. A missing key is
    /// `Ok(None)`, not an error.
    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Durably writes `value` under `key`, replacing any prior value.
    ///
    /// After this returns successfully the value survives process
    /// termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be made durable.
    fn write(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Removes the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs. Removing a missing key
    /// succeeds.
    fn remove(&self, key: &str) -> StoreResult<()>;
}
