//! File-based state store for persistent state.

use crate::error::{StoreError, StoreResult};
use crate::store::StateStore;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// A file-based state store.
///
/// Each key is stored as its own file under a state directory. Data
/// survives process restarts.
///
/// # Durability
///
/// Writes go to a temporary sibling file, are `sync_all`'d, and then
/// renamed over the target. A crash mid-write leaves either the old
/// value or the new value, never a torn file.
///
/// # Example
///
/// ```no_run
/// use medisync_store::{FileStateStore, StateStore};
/// use std::path::Path;
///
/// let store = FileStateStore::open(Path::new("/var/lib/medisync")).unwrap();
/// store.write("mutation_queue", b"{}").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Opens a state store rooted at `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Returns the state directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl StateStore for FileStateStore {
    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;

        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Ok(Some(buffer))
    }

    fn write(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!("{key}.json.tmp"));

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(value)?;
            file.sync_all()?;
        }

        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_key_reads_none() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::open(dir.path()).unwrap();

        assert!(store.read("mutation_queue").unwrap().is_none());
    }

    #[test]
    fn write_then_read() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::open(dir.path()).unwrap();

        store.write("mutation_queue", b"{\"version\":1}").unwrap();
        let value = store.read("mutation_queue").unwrap();
        assert_eq!(value.as_deref(), Some(&b"{\"version\":1}"[..]));
    }

    #[test]
    fn write_replaces_prior_value() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::open(dir.path()).unwrap();

        store.write("last_sync_at", b"old").unwrap();
        store.write("last_sync_at", b"new").unwrap();

        assert_eq!(store.read("last_sync_at").unwrap().as_deref(), Some(&b"new"[..]));
        // No temp file left behind.
        assert!(!dir.path().join("last_sync_at.json.tmp").exists());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = FileStateStore::open(dir.path()).unwrap();
            store.write("mutation_queue", b"persistent").unwrap();
        }

        let store = FileStateStore::open(dir.path()).unwrap();
        assert_eq!(
            store.read("mutation_queue").unwrap().as_deref(),
            Some(&b"persistent"[..])
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::open(dir.path()).unwrap();

        store.write("k", b"v").unwrap();
        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert!(store.read("k").unwrap().is_none());
    }

    #[test]
    fn rejects_path_traversal_keys() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::open(dir.path()).unwrap();

        assert!(matches!(
            store.write("../escape", b"x"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(store.read(""), Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn creates_nested_state_dir() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let store = FileStateStore::open(&nested).unwrap();
        store.write("k", b"v").unwrap();
        assert!(nested.join("k.json").exists());
    }
}
