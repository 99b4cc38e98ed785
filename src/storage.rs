//! Storage adapter for heropath
//!
//! Typed JSON access over a [`KvBackend`], scoped to an application key
//! prefix. Failure policy:
//!
//! - `set` is the only operation that surfaces errors
//!   ([`Error::QuotaExceeded`], [`Error::StorageUnavailable`], ...).
//! - Reads degrade to "absent" when the backend is unavailable.
//! - A value that fails to deserialize is treated as corrupted: it is removed
//!   and the read returns `None`.
//! - `remove` and prefix clears log and swallow failures.
//!
//! # Key layout
//!
//! ```text
//! heropath.tasks.v1             # tasks record
//! heropath.tasks.v1.version     # {version, timestamp} marker
//! heropath.progress.v1          # progress record
//! heropath.progress.v1.version
//! ```

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::backend::{entry_size, KvBackend};
use crate::error::{Error, Result};

/// Default application key prefix
pub const DEFAULT_PREFIX: &str = "heropath.";

const PROBE_KEY: &str = "__heropath_storage_test__";

/// Storage adapter bound to one backend and one key prefix.
#[derive(Debug, Clone)]
pub struct Storage<B> {
    backend: B,
    prefix: String,
}

impl<B: KvBackend> Storage<B> {
    pub fn new(backend: B) -> Self {
        Self::with_prefix(backend, DEFAULT_PREFIX)
    }

    pub fn with_prefix(backend: B, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full key for an application-relative name.
    pub fn prefixed(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read and deserialize `key`.
    ///
    /// Returns `None` when the key is missing, the backend is unavailable, or
    /// the stored value is corrupted (in which case the key is removed).
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key)?;
        match serde_json::from_str::<T>(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                let err = Error::InvalidData {
                    key: key.to_string(),
                    reason: err.to_string(),
                };
                error!(key = %key, error = %err, "removing corrupted storage entry");
                self.remove(key);
                None
            }
        }
    }

    /// Read `key` as untyped JSON.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.get::<Value>(key)
    }

    /// Raw string contents of `key`.
    pub fn get_raw(&self, key: &str) -> Option<String> {
        match self.backend.get_item(key) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key = %key, error = %err, "storage read failed");
                None
            }
        }
    }

    pub fn has(&self, key: &str) -> bool {
        matches!(self.backend.get_item(key), Ok(Some(_)))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Serialize and store `value` under `key`.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let serialized = serde_json::to_string(value)?;
        self.set_raw(key, &serialized)
    }

    pub fn set_raw(&self, key: &str, serialized: &str) -> Result<()> {
        match self.backend.set_item(key, serialized) {
            Ok(()) => {
                debug!(key = %key, bytes = serialized.len(), "stored");
                Ok(())
            }
            Err(err) => {
                if err.is_quota_exceeded() {
                    error!(key = %key, "storage quota exceeded");
                } else {
                    error!(key = %key, error = %err, "storage write failed");
                }
                Err(err)
            }
        }
    }

    /// Remove `key`. Failures are logged, never returned.
    pub fn remove(&self, key: &str) {
        if let Err(err) = self.backend.remove_item(key) {
            warn!(key = %key, error = %err, "storage remove failed");
        }
    }

    // =========================================================================
    // Enumeration
    // =========================================================================

    /// Every stored key starting with `prefix`.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        match self.backend.keys() {
            Ok(keys) => keys.into_iter().filter(|k| k.starts_with(prefix)).collect(),
            Err(err) => {
                warn!(prefix = %prefix, error = %err, "storage enumeration failed");
                Vec::new()
            }
        }
    }

    /// Every stored key under this adapter's prefix.
    pub fn app_keys(&self) -> Vec<String> {
        self.keys_with_prefix(&self.prefix)
    }

    /// Approximate bytes used by this application's keys and values.
    pub fn size_estimate(&self) -> usize {
        self.app_keys()
            .iter()
            .map(|key| {
                let value = self.get_raw(key).unwrap_or_default();
                entry_size(key, &value)
            })
            .sum()
    }

    /// Remove every key starting with `prefix`. Returns the number removed.
    pub fn clear_by_prefix(&self, prefix: &str) -> usize {
        let keys = self.keys_with_prefix(prefix);
        let mut removed = 0;
        for key in &keys {
            match self.backend.remove_item(key) {
                Ok(()) => removed += 1,
                Err(err) => warn!(key = %key, error = %err, "failed to clear key"),
            }
        }
        debug!(prefix = %prefix, removed, "cleared keys");
        removed
    }

    /// Remove every key under this adapter's prefix.
    pub fn clear_app_data(&self) -> usize {
        let prefix = self.prefix.clone();
        self.clear_by_prefix(&prefix)
    }

    /// Probe the backend with a throwaway write.
    pub fn is_available(&self) -> bool {
        let ok = self.backend.set_item(PROBE_KEY, "test").is_ok();
        if ok {
            let _ = self.backend.remove_item(PROBE_KEY);
        }
        ok
    }
}
