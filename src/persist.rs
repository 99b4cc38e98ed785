//! Persistent store adapter.
//!
//! One [`PersistAdapter`] serves one domain store's record key. It ties the
//! pieces of the storage layer together:
//!
//! - reads go through the [`Migrator`] and come back at the current schema
//!   version (or untouched, if migration fails);
//! - writes are optionally debounced, always refresh the version marker,
//!   and retry once after a stale-key cleanup when the quota is exceeded;
//! - storage failures are reported to an optional error callback and kept
//!   as the adapter's last error.

use std::fmt;
use std::rc::Rc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::backend::KvBackend;
use crate::clock::Clock;
use crate::debounce::DebouncedWriter;
use crate::error::{Error, Result};
use crate::migration::{version_key, Migrator};
use crate::quota::QuotaManager;
use crate::storage::Storage;

/// Callback invoked for every storage failure the adapter sees.
pub type ErrorCallback = Box<dyn Fn(&Error)>;

pub struct PersistAdapter<B> {
    storage: Storage<B>,
    key: String,
    migrator: Migrator,
    writer: Option<DebouncedWriter>,
    quota: QuotaManager,
    clock: Rc<dyn Clock>,
    on_error: Option<ErrorCallback>,
    last_error: Option<String>,
}

impl<B: fmt::Debug> fmt::Debug for PersistAdapter<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistAdapter")
            .field("key", &self.key)
            .field("storage", &self.storage)
            .field("migrator", &self.migrator)
            .field("writer", &self.writer)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl<B: KvBackend> PersistAdapter<B> {
    /// Adapter for `key` writing straight through (no debouncing).
    pub fn new(
        storage: Storage<B>,
        key: impl Into<String>,
        migrator: Migrator,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            key: key.into(),
            migrator,
            writer: None,
            quota: QuotaManager::default(),
            clock,
            on_error: None,
            last_error: None,
        }
    }

    /// Coalesce writes for `delay_ms`.
    pub fn with_debounce(mut self, delay_ms: i64) -> Self {
        self.writer = Some(DebouncedWriter::new(delay_ms));
        self
    }

    pub fn with_quota(mut self, quota: QuotaManager) -> Self {
        self.quota = quota;
        self
    }

    pub fn with_error_callback(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn storage(&self) -> &Storage<B> {
        &self.storage
    }

    pub fn quota(&self) -> &QuotaManager {
        &self.quota
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Schema version recorded for this adapter's key.
    pub fn stored_version(&self) -> u32 {
        self.migrator.stored_version(&self.storage, &self.key)
    }

    pub fn has_pending(&self) -> bool {
        self.writer
            .as_ref()
            .is_some_and(|w| w.is_pending(&self.key))
    }

    fn report(&mut self, err: &Error) {
        self.last_error = Some(err.to_string());
        if let Some(callback) = &self.on_error {
            callback(err);
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current record as untyped JSON, migrated to the current version.
    ///
    /// A pending debounced write is returned as-is. When migration fails the
    /// error is reported and the stored data comes back unmigrated.
    pub fn get_item(&mut self) -> Option<Value> {
        if let Some(pending) = self
            .writer
            .as_ref()
            .and_then(|w| w.pending_value(&self.key))
        {
            return Some(pending.clone());
        }

        let data = self.storage.get_value(&self.key)?;
        let stored = self.stored_version();
        if stored >= self.migrator.current_version() {
            return Some(data);
        }

        // The marker is only written after the migrated record lands, so a
        // failed write leaves the key marked at its old version.
        match self.migrator.transform(&self.key, data.clone(), stored) {
            Ok(migrated) => {
                if let Err(err) = self.write_now(&migrated) {
                    warn!(key = %self.key, error = %err, "could not persist migrated record");
                }
                Some(migrated)
            }
            Err(err) => {
                error!(key = %self.key, error = %err, "migration failed, keeping stored data");
                self.report(&err);
                Some(data)
            }
        }
    }

    /// Typed read. A record that does not fit `T` is reported as invalid
    /// data and read as absent; the stored value is left in place.
    pub fn load<T: DeserializeOwned>(&mut self) -> Option<T> {
        let value = self.get_item()?;
        match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(err) => {
                let err = Error::InvalidData {
                    key: self.key.clone(),
                    reason: err.to_string(),
                };
                self.report(&err);
                None
            }
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Persist `value`, debounced when a writer is configured.
    pub fn set_item(&mut self, value: Value) -> Result<()> {
        let now = self.clock.now_ms();
        match self.writer.as_mut() {
            Some(writer) => {
                writer.schedule_write(self.key.clone(), value, now);
                Ok(())
            }
            None => self.write_now(&value),
        }
    }

    /// Typed form of [`PersistAdapter::set_item`].
    pub fn save<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let value = serde_json::to_value(record)?;
        self.set_item(value)
    }

    /// Write `value` and its version marker immediately.
    fn write_now(&mut self, value: &Value) -> Result<()> {
        let result = self.write_with_retry(value).and_then(|()| {
            self.migrator.set_version(
                &self.storage,
                self.clock.as_ref(),
                &self.key,
                self.migrator.current_version(),
            )
        });
        if let Err(err) = &result {
            self.report(err);
        }
        result
    }

    fn write_with_retry(&self, value: &Value) -> Result<()> {
        match self.storage.set(&self.key, value) {
            Err(err) if err.is_quota_exceeded() => {
                let preserve = [self.key.clone(), version_key(&self.key)];
                let removed = self.quota.cleanup(&self.storage, preserve);
                warn!(key = %self.key, removed, "quota exceeded, retrying after cleanup");
                self.storage.set(&self.key, value)
            }
            other => other,
        }
    }

    /// Remove the record and its version marker. Drops a pending write for
    /// the key.
    pub fn remove_item(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            writer.cancel_key(&self.key);
        }
        self.storage.remove(&self.key);
        self.storage.remove(&version_key(&self.key));
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Write the pending record if its delay has elapsed. Returns the number
    /// of records written.
    pub fn run_due(&mut self) -> usize {
        let now = self.clock.now_ms();
        let due = match self.writer.as_mut() {
            Some(writer) => writer.take_due(now),
            None => return 0,
        };
        self.write_batch(due)
    }

    /// Write every pending record now. Returns the number written, or the
    /// first write error; a failed record is reported and dropped.
    pub fn flush(&mut self) -> Result<usize> {
        let pending = match self.writer.as_mut() {
            Some(writer) => writer.take_all(),
            None => return Ok(0),
        };
        let mut written = 0;
        let mut failure = None;
        for (key, value) in pending {
            debug!(key = %key, "flushing debounced record");
            match self.write_now(&value) {
                Ok(()) => written += 1,
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(written),
        }
    }

    /// Drop every pending write.
    pub fn cancel(&mut self) -> usize {
        self.writer.as_mut().map_or(0, DebouncedWriter::cancel)
    }

    fn write_batch(&mut self, writes: Vec<(String, Value)>) -> usize {
        let mut written = 0;
        for (key, value) in writes {
            debug!(key = %key, "writing debounced record");
            if self.write_now(&value).is_ok() {
                written += 1;
            }
        }
        written
    }
}
