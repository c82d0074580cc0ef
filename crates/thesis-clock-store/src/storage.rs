//! Local durable key/value storage.
//!
//! The clock keeps exactly one entry (the virtual time) but the storage is
//! a general string store so other parts of the application can read the
//! same key at startup to decide whether virtual time is active.
//!
//! | Implementation | Backing |
//! |----------------|---------|
//! | [`FileStorage`] | One JSON object on disk, one member per key |
//! | [`MemoryStorage`] | A map in memory (tests, ephemeral sessions) |

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use crate::error::StoreError;

/// A string key/value store that survives restarts.
pub trait DurableStorage: Send + Sync + fmt::Debug {
    /// Read the value stored at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` at `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// Storage backed by a single JSON file.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so a crash mid-write leaves the previous contents intact. A
/// missing file reads as empty.
///
/// The clock writes once per virtual second, so the parent directory is
/// created once and only re-created if it disappears.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
    /// Set once the parent directory is known to exist.
    parent_ready: AtomicBool,
}

impl FileStorage {
    /// Use the JSON file at `path`. Parent directories are created on the
    /// first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            parent_ready: AtomicBool::new(false),
        }
    }

    /// The storage file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Like [`read_entries`](Self::read_entries) but a corrupt file is
    /// discarded so that writes can recover it.
    fn read_entries_for_write(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match self.read_entries() {
            Err(StoreError::Serialization(e)) => {
                warn!(path = %self.path.display(), error = %e, "storage file corrupt, starting fresh");
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        if !self.parent_ready.load(Ordering::Relaxed) {
            self.create_parent()?;
        }
        match std::fs::write(&tmp, &json) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "storage directory vanished, recreating");
                self.create_parent()?;
                std::fs::write(&tmp, &json).map_err(io_err)?;
            }
            other => other.map_err(io_err)?,
        }
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        debug!(path = %self.path.display(), entries = entries.len(), "storage file written");
        Ok(())
    }

    fn create_parent(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        self.parent_ready.store(true, Ordering::Relaxed);
        Ok(())
    }
}

impl DurableStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries_for_write()?;
        entries.insert(key.to_owned(), value.to_owned());
        self.write_entries(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries_for_write()?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.write_entries(&entries)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_file() -> PathBuf {
        std::env::temp_dir()
            .join(format!("thesis-clock-storage-{}", uuid::Uuid::new_v4()))
            .join("storage.json")
    }

    #[test]
    fn memory_storage_set_get_remove() {
        let store = MemoryStorage::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn file_storage_missing_file_reads_empty() {
        let store = FileStorage::new(temp_file());
        assert_eq!(store.get("virtualClock").unwrap(), None);
        store.remove("virtualClock").unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn file_storage_survives_reopen() {
        let path = temp_file();
        FileStorage::new(&path).set("virtualClock", "2030-01-01T00:00:00").unwrap();
        FileStorage::new(&path).set("theme", "dark").unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(
            reopened.get("virtualClock").unwrap().as_deref(),
            Some("2030-01-01T00:00:00")
        );
        assert_eq!(reopened.get("theme").unwrap().as_deref(), Some("dark"));

        reopened.remove("virtualClock").unwrap();
        assert_eq!(FileStorage::new(&path).get("virtualClock").unwrap(), None);
        assert_eq!(FileStorage::new(&path).get("theme").unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn directory_is_created_once_and_recreated_if_removed() {
        let path = temp_file();
        let store = FileStorage::new(&path);
        assert!(!store.parent_ready.load(Ordering::Relaxed));

        store.set("virtualClock", "2030-01-01T00:00:00").unwrap();
        assert!(store.parent_ready.load(Ordering::Relaxed));
        store.set("virtualClock", "2030-01-01T00:00:01").unwrap();

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
        store.set("virtualClock", "2030-01-01T00:00:02").unwrap();
        assert_eq!(
            store.get("virtualClock").unwrap().as_deref(),
            Some("2030-01-01T00:00:02")
        );
    }

    #[test]
    fn corrupt_file_fails_reads_but_recovers_on_write() {
        let path = temp_file();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStorage::new(&path);
        assert!(matches!(store.get("k"), Err(StoreError::Serialization(_))));
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }
}
