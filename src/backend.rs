//! Persistent key/value backends.
//!
//! A [`KvBackend`] models the host environment's persistent string store
//! (`getItem` / `setItem` / `removeItem` / `key` / `length`). Two backends
//! ship with the crate:
//!
//! - [`MemoryBackend`]: an in-process map shared by every clone of the
//!   handle, with an optional byte capacity and an on/off switch so tests can
//!   exercise quota and unavailability failures.
//! - [`FileBackend`]: a single JSON document on disk, read and rewritten under
//!   an advisory file lock with atomic renames.
//!
//! Sizes are counted the way the browser does: UTF-16 code units of every
//! key and value, times two bytes.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};

/// Host key/value store contract.
///
/// Every method may fail with [`Error::StorageUnavailable`] when the store is
/// disabled; `set_item` may also fail with [`Error::QuotaExceeded`].
pub trait KvBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&self, key: &str) -> Result<()>;

    /// Key at position `index`, in the backend's iteration order.
    fn key(&self, index: usize) -> Result<Option<String>>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Snapshot of every key currently stored.
    fn keys(&self) -> Result<Vec<String>> {
        let len = self.len()?;
        let mut keys = Vec::with_capacity(len);
        for index in 0..len {
            if let Some(key) = self.key(index)? {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

/// Approximate stored size of a key/value pair in bytes (UTF-16).
pub fn entry_size(key: &str, value: &str) -> usize {
    (key.encode_utf16().count() + value.encode_utf16().count()) * 2
}

fn map_size(items: &BTreeMap<String, String>) -> usize {
    items.iter().map(|(k, v)| entry_size(k, v)).sum()
}

/// Size of `items` after `key` is set to `value`.
fn size_after_set(items: &BTreeMap<String, String>, key: &str, value: &str) -> usize {
    let existing = items.get(key).map(|old| entry_size(key, old)).unwrap_or(0);
    map_size(items) - existing + entry_size(key, value)
}

// =============================================================================
// In-memory backend
// =============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    items: BTreeMap<String, String>,
    capacity: Option<usize>,
    disabled: bool,
}

/// Shared in-process store. Clones observe the same data, the same way every
/// store in one browser origin shares one `localStorage`.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once total size would exceed `bytes`.
    pub fn with_capacity(bytes: usize) -> Self {
        let backend = Self::default();
        backend.state.borrow_mut().capacity = Some(bytes);
        backend
    }

    /// Make every operation fail as if the environment disabled storage.
    pub fn disable(&self) {
        self.state.borrow_mut().disabled = true;
    }

    pub fn enable(&self) {
        self.state.borrow_mut().disabled = false;
    }

    /// Raw contents, bypassing the availability switch.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.state.borrow().items.get(key).cloned()
    }

    /// Write raw contents, bypassing capacity and availability checks.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.state
            .borrow_mut()
            .items
            .insert(key.to_string(), value.to_string());
    }

    fn check_available(&self) -> Result<()> {
        if self.state.borrow().disabled {
            return Err(Error::StorageUnavailable(
                "in-memory store is disabled".to_string(),
            ));
        }
        Ok(())
    }
}

impl KvBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self.state.borrow().items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.borrow_mut();
        if let Some(capacity) = state.capacity {
            if size_after_set(&state.items, key, value) > capacity {
                return Err(Error::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }
        state.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.state.borrow_mut().items.remove(key);
        Ok(())
    }

    fn key(&self, index: usize) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self.state.borrow().items.keys().nth(index).cloned())
    }

    fn len(&self) -> Result<usize> {
        self.check_available()?;
        Ok(self.state.borrow().items.len())
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.check_available()?;
        Ok(self.state.borrow().items.keys().cloned().collect())
    }
}

// =============================================================================
// File backend
// =============================================================================

/// Key/value store persisted as one JSON object on disk.
///
/// Reads and read-modify-write cycles hold `<file>.lock` so that two
/// processes sharing a data directory never interleave partial updates.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    capacity: Option<usize>,
    lock_timeout_ms: u64,
}

impl FileBackend {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            capacity: None,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_capacity(mut self, bytes: usize) -> Self {
        self.capacity = Some(bytes);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<FileLock> {
        FileLock::acquire(lock::lock_path_for(&self.path), self.lock_timeout_ms).map_err(
            |err| match err {
                Error::LockFailed(path) => Error::StorageUnavailable(format!(
                    "could not lock {} within {}ms",
                    path.display(),
                    self.lock_timeout_ms
                )),
                other => other,
            },
        )
    }

    fn read_document(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|err| Error::InvalidData {
            key: self.path.display().to_string(),
            reason: err.to_string(),
        })
    }

    fn write_document(&self, items: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(items)?;
        lock::write_atomic(&self.path, json.as_bytes())
    }

    fn with_document<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&BTreeMap<String, String>) -> T,
    {
        let _lock = self.lock()?;
        let items = self.read_document()?;
        Ok(f(&items))
    }

    fn update_document<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> Result<T>,
    {
        let _lock = self.lock()?;
        let mut items = self.read_document()?;
        let result = f(&mut items)?;
        self.write_document(&items)?;
        Ok(result)
    }
}

impl KvBackend for FileBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.with_document(|items| items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let capacity = self.capacity;
        self.update_document(|items| {
            if let Some(capacity) = capacity {
                if size_after_set(items, key, value) > capacity {
                    return Err(Error::QuotaExceeded {
                        key: key.to_string(),
                    });
                }
            }
            items.insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.update_document(|items| {
            items.remove(key);
            Ok(())
        })
    }

    fn key(&self, index: usize) -> Result<Option<String>> {
        self.with_document(|items| items.keys().nth(index).cloned())
    }

    fn len(&self) -> Result<usize> {
        self.with_document(|items| items.len())
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.with_document(|items| items.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn entry_size_counts_utf16_units_twice() {
        assert_eq!(entry_size("ab", "cd"), 8);
        // One astral-plane character is two UTF-16 code units.
        assert_eq!(entry_size("k", "\u{1F600}"), 6);
    }

    #[test]
    fn memory_clones_share_state() {
        let a = MemoryBackend::new();
        let b = a.clone();
        a.set_item("heropath.x", "1").unwrap();
        assert_eq!(b.get_item("heropath.x").unwrap(), Some("1".to_string()));
        assert_eq!(b.len().unwrap(), 1);
        assert_eq!(b.key(0).unwrap(), Some("heropath.x".to_string()));
        assert_eq!(b.key(1).unwrap(), None);
    }

    #[test]
    fn memory_capacity_rejects_oversized_write() {
        let backend = MemoryBackend::with_capacity(20);
        backend.set_item("a", "1234").unwrap(); // 10 bytes
        let err = backend.set_item("b", "123456789").unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(backend.raw("b"), None);

        // Replacing an existing value only counts the difference.
        backend.set_item("a", "12345678").unwrap(); // 18 bytes
    }

    #[test]
    fn disabled_memory_backend_fails_every_call() {
        let backend = MemoryBackend::new();
        backend.insert_raw("k", "v");
        backend.disable();
        assert!(matches!(
            backend.get_item("k"),
            Err(Error::StorageUnavailable(_))
        ));
        assert!(backend.set_item("k", "w").is_err());
        assert!(backend.len().is_err());
        backend.enable();
        assert_eq!(backend.get_item("k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn file_backend_round_trips_across_handles() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store.json");

        let first = FileBackend::open(&path);
        first.set_item("heropath.tasks.v1", "{\"tasks\":[]}").unwrap();
        first.set_item("heropath.other", "1").unwrap();

        let second = FileBackend::open(&path);
        assert_eq!(
            second.get_item("heropath.tasks.v1").unwrap(),
            Some("{\"tasks\":[]}".to_string())
        );
        assert_eq!(second.keys().unwrap().len(), 2);

        second.remove_item("heropath.other").unwrap();
        assert_eq!(first.len().unwrap(), 1);
    }

    #[test]
    fn file_backend_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let backend = FileBackend::open(temp.path().join("absent.json"));
        assert!(backend.is_empty().unwrap());
        assert_eq!(backend.get_item("x").unwrap(), None);
    }

    #[test]
    fn file_backend_enforces_capacity() {
        let temp = TempDir::new().unwrap();
        let backend = FileBackend::open(temp.path().join("store.json")).with_capacity(16);
        backend.set_item("a", "b").unwrap();
        assert!(backend.set_item("big", "0123456789").unwrap_err().is_quota_exceeded());
        assert_eq!(backend.get_item("big").unwrap(), None);
    }

    #[test]
    fn corrupted_document_reports_invalid_data() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store.json");
        fs::write(&path, "not json").unwrap();
        let backend = FileBackend::open(&path);
        assert!(matches!(
            backend.get_item("x"),
            Err(Error::InvalidData { .. })
        ));
    }
}
