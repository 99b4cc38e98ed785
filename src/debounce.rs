//! Debounced writes.
//!
//! [`DebouncedWriter`] owns the key -> pending-write map. Scheduling a write
//! for a key replaces whatever was pending for that key and restarts its
//! delay, so a burst of writes collapses into one write of the last value.
//! Time is passed in explicitly (epoch milliseconds from a
//! [`Clock`](crate::clock::Clock)); nothing fires on its own. The owner calls
//! [`DebouncedWriter::run_due`] when it next gets control, and
//! [`DebouncedWriter::flush`] when the host is about to go away.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, error};

use crate::backend::KvBackend;
use crate::storage::Storage;

pub const DEFAULT_DEBOUNCE_DELAY_MS: i64 = 500;

#[derive(Debug, Clone, PartialEq)]
struct PendingWrite {
    value: Value,
    due_at: i64,
}

#[derive(Debug, Clone)]
pub struct DebouncedWriter {
    delay_ms: i64,
    pending: BTreeMap<String, PendingWrite>,
}

impl Default for DebouncedWriter {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_DELAY_MS)
    }
}

impl DebouncedWriter {
    pub fn new(delay_ms: i64) -> Self {
        Self {
            delay_ms: delay_ms.max(0),
            pending: BTreeMap::new(),
        }
    }

    pub fn delay_ms(&self) -> i64 {
        self.delay_ms
    }

    /// Replace any pending write for `key` with `value`, due `delay` from `now_ms`.
    pub fn schedule_write(&mut self, key: impl Into<String>, value: Value, now_ms: i64) {
        let key = key.into();
        let due_at = now_ms.saturating_add(self.delay_ms);
        if self.pending.insert(key.clone(), PendingWrite { value, due_at }).is_some() {
            debug!(key = %key, due_at, "coalesced pending write");
        }
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Value currently waiting to be written for `key`.
    pub fn pending_value(&self, key: &str) -> Option<&Value> {
        self.pending.get(key).map(|p| &p.value)
    }

    /// Earliest instant at which a pending write becomes due.
    pub fn next_due(&self) -> Option<i64> {
        self.pending.values().map(|p| p.due_at).min()
    }

    /// Remove and return every write whose delay has elapsed at `now_ms`.
    pub fn take_due(&mut self, now_ms: i64) -> Vec<(String, Value)> {
        let due: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, p)| p.due_at <= now_ms)
            .map(|(k, _)| k.clone())
            .collect();

        due.into_iter()
            .filter_map(|key| self.pending.remove(&key).map(|p| (key, p.value)))
            .collect()
    }

    /// Remove and return every pending write regardless of its delay.
    pub fn take_all(&mut self) -> Vec<(String, Value)> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(key, p)| (key, p.value))
            .collect()
    }

    /// Write every due entry to `storage`. Returns the number written.
    pub fn run_due<B: KvBackend>(&mut self, storage: &Storage<B>, now_ms: i64) -> usize {
        let writes = self.take_due(now_ms);
        write_all(storage, writes)
    }

    /// Write every pending entry to `storage` immediately.
    pub fn flush<B: KvBackend>(&mut self, storage: &Storage<B>) -> usize {
        let writes = self.take_all();
        write_all(storage, writes)
    }

    /// Drop every pending write without writing it. Returns how many were dropped.
    pub fn cancel(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    /// Drop the pending write for `key`, if any.
    pub fn cancel_key(&mut self, key: &str) -> bool {
        self.pending.remove(key).is_some()
    }
}

fn write_all<B: KvBackend>(storage: &Storage<B>, writes: Vec<(String, Value)>) -> usize {
    let mut written = 0;
    for (key, value) in writes {
        match storage.set(&key, &value) {
            Ok(()) => written += 1,
            Err(err) => error!(key = %key, error = %err, "debounced write failed"),
        }
    }
    written
}
