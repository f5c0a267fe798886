//! In-memory state store for testing.

use crate::error::{StoreError, StoreResult};
use crate::store::StateStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory state store.
///
/// Values do not survive process termination. Intended for tests and
/// ephemeral configurations.
///
/// Writes can be made to fail on demand with [`set_fail_writes`], which
/// lets tests exercise the engine's persistence-failure tolerance.
///
/// [`set_fail_writes`]: MemoryStateStore::set_fail_writes
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: RwLock<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemoryStateStore {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, all subsequent writes fail with
    /// [`StoreError::WriteRejected`] until cleared.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Returns true if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn write(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteRejected("simulated write failure".into()));
        }
        self.values.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.values.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_remove() {
        let store = MemoryStateStore::new();

        assert!(store.read("k").unwrap().is_none());

        store.write("k", b"v").unwrap();
        assert_eq!(store.read("k").unwrap().as_deref(), Some(&b"v"[..]));
        assert_eq!(store.len(), 1);

        store.remove("k").unwrap();
        assert!(store.read("k").unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn simulated_write_failure() {
        let store = MemoryStateStore::new();
        store.write("k", b"before").unwrap();

        store.set_fail_writes(true);
        assert!(matches!(
            store.write("k", b"after"),
            Err(StoreError::WriteRejected(_))
        ));
        // Prior value untouched.
        assert_eq!(store.read("k").unwrap().as_deref(), Some(&b"before"[..]));

        store.set_fail_writes(false);
        store.write("k", b"after").unwrap();
        assert_eq!(store.read("k").unwrap().as_deref(), Some(&b"after"[..]));
    }
}
