//! Storage quota monitoring and stale-key cleanup.

use std::collections::HashSet;

use glob::Pattern;
use serde::Serialize;
use tracing::{debug, info};

use crate::backend::KvBackend;
use crate::config::QuotaConfig;
use crate::error::{Error, Result};
use crate::storage::Storage;

/// Typical browser ceiling for one origin's local store.
pub const DEFAULT_MAX_BYTES: usize = 5 * 1024 * 1024;

pub const DEFAULT_WARNING_THRESHOLD: f64 = 0.8;

/// Keys that only ever hold derived or temporary data.
pub const DEFAULT_STALE_PATTERNS: [&str; 2] = ["*.version", "*.temp*"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuotaUsage {
    /// Bytes in use under the application prefix
    pub current: usize,
    pub max: usize,
    /// 0-100
    pub percentage: f64,
    pub available: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuotaStatus {
    /// Below the ceiling
    pub available: bool,
    /// At or above the warning threshold
    pub warning: bool,
    /// Fraction of the ceiling in use (may exceed 1.0)
    pub usage: f64,
}

#[derive(Debug, Clone)]
pub struct QuotaManager {
    max_bytes: usize,
    warning_threshold: f64,
    stale_patterns: Vec<Pattern>,
}

impl Default for QuotaManager {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            stale_patterns: DEFAULT_STALE_PATTERNS
                .iter()
                .filter_map(|p| Pattern::new(p).ok())
                .collect(),
        }
    }
}

impl QuotaManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &QuotaConfig) -> Result<Self> {
        let stale_patterns = config
            .stale_patterns
            .iter()
            .map(|raw| {
                Pattern::new(raw).map_err(|err| {
                    Error::InvalidConfig(format!(
                        "quota.stale_patterns: invalid glob pattern '{raw}': {err}"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            max_bytes: config.max_bytes,
            warning_threshold: config.warning_threshold,
            stale_patterns,
        })
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn usage<B: KvBackend>(&self, storage: &Storage<B>) -> QuotaUsage {
        let current = storage.size_estimate();
        let percentage = if self.max_bytes == 0 {
            100.0
        } else {
            (current as f64 / self.max_bytes as f64 * 100.0).min(100.0)
        };

        QuotaUsage {
            current,
            max: self.max_bytes,
            percentage,
            available: self.max_bytes.saturating_sub(current),
        }
    }

    pub fn check_quota<B: KvBackend>(&self, storage: &Storage<B>) -> QuotaStatus {
        let current = storage.size_estimate();
        let usage = if self.max_bytes == 0 {
            1.0
        } else {
            current as f64 / self.max_bytes as f64
        };

        QuotaStatus {
            available: current < self.max_bytes,
            warning: usage >= self.warning_threshold,
            usage,
        }
    }

    /// True when `key` only holds stale data (version markers, temp entries).
    pub fn is_stale(&self, key: &str) -> bool {
        self.stale_patterns.iter().any(|p| p.matches(key))
    }

    /// Remove stale keys under the application prefix that are not in
    /// `keys_to_preserve`. Live records never match, so they are never
    /// touched. Returns the number of keys removed.
    pub fn cleanup<B, I, S>(&self, storage: &Storage<B>, keys_to_preserve: I) -> usize
    where
        B: KvBackend,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let preserve: HashSet<String> = keys_to_preserve.into_iter().map(Into::into).collect();

        let doomed: Vec<String> = storage
            .app_keys()
            .into_iter()
            .filter(|key| !preserve.contains(key) && self.is_stale(key))
            .collect();

        for key in &doomed {
            debug!(key = %key, "removing stale key");
            storage.remove(key);
        }

        if !doomed.is_empty() {
            info!(removed = doomed.len(), "storage cleanup finished");
        }
        doomed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn storage() -> Storage<MemoryBackend> {
        Storage::new(MemoryBackend::new())
    }

    #[test]
    fn usage_reports_percentage_and_headroom() {
        let storage = storage();
        // (10 + 10) * 2 = 40 bytes
        storage.backend().insert_raw("heropath.x", "0123456789");

        let manager = QuotaManager {
            max_bytes: 100,
            ..QuotaManager::default()
        };
        let usage = manager.usage(&storage);
        assert_eq!(usage.current, 40);
        assert_eq!(usage.max, 100);
        assert_eq!(usage.available, 60);
        assert!((usage.percentage - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn check_quota_flags_warning_and_exhaustion() {
        let storage = storage();
        storage.backend().insert_raw("heropath.x", "0123456789"); // 40 bytes

        let roomy = QuotaManager {
            max_bytes: 100,
            ..QuotaManager::default()
        };
        let status = roomy.check_quota(&storage);
        assert!(status.available);
        assert!(!status.warning);

        let tight = QuotaManager {
            max_bytes: 48,
            ..QuotaManager::default()
        };
        let status = tight.check_quota(&storage);
        assert!(status.available);
        assert!(status.warning);

        let full = QuotaManager {
            max_bytes: 40,
            ..QuotaManager::default()
        };
        let status = full.check_quota(&storage);
        assert!(!status.available);
        assert_eq!(full.usage(&storage).percentage, 100.0);
        assert_eq!(full.usage(&storage).available, 0);
    }

    #[test]
    fn cleanup_removes_only_stale_unpreserved_keys() {
        let storage = storage();
        let backend = storage.backend();
        backend.insert_raw("heropath.tasks.v1", "{}");
        backend.insert_raw("heropath.tasks.v1.version", "{}");
        backend.insert_raw("heropath.progress.v1.version", "{}");
        backend.insert_raw("heropath.draft.temp", "{}");
        backend.insert_raw("other.thing.version", "{}");

        let manager = QuotaManager::new();
        let removed = manager.cleanup(&storage, ["heropath.progress.v1.version"]);

        assert_eq!(removed, 2);
        assert!(backend.raw("heropath.tasks.v1").is_some());
        assert!(backend.raw("heropath.progress.v1.version").is_some());
        assert!(backend.raw("heropath.tasks.v1.version").is_none());
        assert!(backend.raw("heropath.draft.temp").is_none());
        assert!(backend.raw("other.thing.version").is_some());
    }

    #[test]
    fn cleanup_never_touches_live_records() {
        let storage = storage();
        storage.backend().insert_raw("heropath.tasks.v1", "{}");
        storage.backend().insert_raw("heropath.progress.v1", "{}");

        let removed = QuotaManager::new().cleanup(&storage, Vec::<String>::new());
        assert_eq!(removed, 0);
        assert_eq!(storage.app_keys().len(), 2);
    }

    #[test]
    fn from_config_rejects_bad_patterns() {
        let config = QuotaConfig {
            stale_patterns: vec!["[".to_string()],
            ..QuotaConfig::default()
        };
        assert!(matches!(
            QuotaManager::from_config(&config),
            Err(Error::InvalidConfig(_))
        ));
    }
}
