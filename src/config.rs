//! Configuration loading and management
//!
//! Handles parsing of `heropath.toml` inside the data directory.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::task::Difficulty;

/// Config file name inside the data directory
pub const CONFIG_FILE: &str = "heropath.toml";

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "HEROPATH_DATA";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Quota configuration
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Tasks configuration
    #[serde(default)]
    pub tasks: TasksConfig,
}

/// Storage-related configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Prefix applied to every persisted key
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Coalesce bursts of writes per key
    #[serde(default = "default_true")]
    pub debounce: bool,

    /// Delay before a debounced write lands
    #[serde(default = "default_debounce_delay_ms")]
    pub debounce_delay_ms: i64,

    /// Store file name, relative to the data directory
    #[serde(default = "default_store_file")]
    pub file: String,
}

fn default_prefix() -> String {
    crate::storage::DEFAULT_PREFIX.to_string()
}

fn default_true() -> bool {
    true
}

fn default_debounce_delay_ms() -> i64 {
    crate::debounce::DEFAULT_DEBOUNCE_DELAY_MS
}

fn default_store_file() -> String {
    "store.json".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            debounce: default_true(),
            debounce_delay_ms: default_debounce_delay_ms(),
            file: default_store_file(),
        }
    }
}

/// Quota configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    /// Capacity ceiling in bytes
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Fraction of the ceiling that triggers a warning
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,

    /// Glob patterns for keys that cleanup may remove
    #[serde(default = "default_stale_patterns")]
    pub stale_patterns: Vec<String>,
}

fn default_max_bytes() -> usize {
    crate::quota::DEFAULT_MAX_BYTES
}

fn default_warning_threshold() -> f64 {
    crate::quota::DEFAULT_WARNING_THRESHOLD
}

fn default_stale_patterns() -> Vec<String> {
    crate::quota::DEFAULT_STALE_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            warning_threshold: default_warning_threshold(),
            stale_patterns: default_stale_patterns(),
        }
    }
}

/// Tasks configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TasksConfig {
    /// Difficulty for drafts that do not name one
    #[serde(default = "default_difficulty")]
    pub default_difficulty: String,
}

fn default_difficulty() -> String {
    Difficulty::Medium.as_str().to_string()
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            default_difficulty: default_difficulty(),
        }
    }
}

impl TasksConfig {
    /// Parsed default difficulty.
    pub fn difficulty(&self) -> Result<Difficulty> {
        self.default_difficulty.parse().map_err(|_| {
            Error::InvalidConfig(format!(
                "tasks.default_difficulty: invalid difficulty '{}' (expected easy|medium|hard)",
                self.default_difficulty
            ))
        })
    }
}

impl Config {
    /// Load configuration from a `heropath.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the data directory, or return defaults
    pub fn load_from_dir(data_dir: &Path) -> Self {
        let config_path = data_dir.join(CONFIG_FILE);
        if config_path.exists() {
            match Self::load(&config_path) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                    Self::default()
                }
            }
        } else {
            Self::default()
        }
    }

    /// Path of the store file for `data_dir`.
    pub fn store_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.storage.file)
    }

    pub fn validate(&self) -> Result<()> {
        self.storage.validate()?;
        self.quota.validate()?;
        self.tasks.difficulty()?;
        Ok(())
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        if self.prefix.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "storage.prefix cannot be empty".to_string(),
            ));
        }
        if self.debounce_delay_ms < 0 {
            return Err(Error::InvalidConfig(
                "storage.debounce_delay_ms must be >= 0".to_string(),
            ));
        }
        if self.file.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "storage.file cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl QuotaConfig {
    fn validate(&self) -> Result<()> {
        if self.max_bytes == 0 {
            return Err(Error::InvalidConfig(
                "quota.max_bytes must be > 0".to_string(),
            ));
        }
        if !(self.warning_threshold > 0.0 && self.warning_threshold <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "quota.warning_threshold must be in (0, 1], got {}",
                self.warning_threshold
            )));
        }
        for pattern in &self.stale_patterns {
            validate_pattern(pattern, "quota.stale_patterns")?;
        }
        Ok(())
    }
}

fn validate_pattern(pattern: &str, field: &str) -> Result<()> {
    if pattern.trim().is_empty() {
        return Err(Error::InvalidConfig(format!(
            "{field}: pattern cannot be empty"
        )));
    }
    glob::Pattern::new(pattern).map_err(|err| {
        Error::InvalidConfig(format!(
            "{field}: invalid glob pattern '{pattern}': {err}"
        ))
    })?;
    Ok(())
}

/// Resolve the data directory: explicit path, then `HEROPATH_DATA`, then the
/// platform data directory, then `./.heropath`.
pub fn resolve_data_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(path) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(path);
    }
    directories::ProjectDirs::from("", "", "heropath")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".heropath"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert_eq!(cfg.storage.prefix, "heropath.");
        assert!(cfg.storage.debounce);
        assert_eq!(cfg.storage.debounce_delay_ms, 500);
        assert_eq!(cfg.storage.file, "store.json");
        assert_eq!(cfg.quota.max_bytes, 5 * 1024 * 1024);
        assert_eq!(cfg.quota.warning_threshold, 0.8);
        assert_eq!(
            cfg.quota.stale_patterns,
            vec!["*.version".to_string(), "*.temp*".to_string()]
        );
        assert_eq!(cfg.tasks.difficulty().unwrap(), Difficulty::Medium);
        cfg.validate().expect("defaults validate");
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[storage]
prefix = "hp:"
debounce = false
debounce_delay_ms = 250
file = "data.json"

[quota]
max_bytes = 1024
warning_threshold = 0.5
stale_patterns = ["*.bak"]

[tasks]
default_difficulty = "hard"
"#;
        fs::write(&path, content.trim()).expect("write config");
        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.storage.prefix, "hp:");
        assert!(!cfg.storage.debounce);
        assert_eq!(cfg.storage.debounce_delay_ms, 250);
        assert_eq!(cfg.store_path(dir.path()), dir.path().join("data.json"));
        assert_eq!(cfg.quota.max_bytes, 1024);
        assert_eq!(cfg.quota.stale_patterns, vec!["*.bak".to_string()]);
        assert_eq!(cfg.tasks.difficulty().unwrap(), Difficulty::Hard);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[quota]\nmax_bytes = 2048\n").expect("write config");
        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.quota.max_bytes, 2048);
        assert_eq!(cfg.quota.warning_threshold, 0.8);
        assert_eq!(cfg.storage.prefix, "heropath.");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.storage.prefix = "  ".to_string();
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));

        let mut cfg = Config::default();
        cfg.quota.warning_threshold = 0.0;
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));

        let mut cfg = Config::default();
        cfg.quota.stale_patterns = vec!["[".to_string()];
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));

        let mut cfg = Config::default();
        cfg.tasks.default_difficulty = "legendary".to_string();
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn load_from_dir_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from_dir(dir.path());
        assert_eq!(cfg.storage.prefix, "heropath.");

        fs::write(dir.path().join(CONFIG_FILE), "[quota]\nwarning_threshold = 7.0\n")
            .expect("write config");
        let cfg = Config::load_from_dir(dir.path());
        assert_eq!(cfg.quota.warning_threshold, 0.8);
    }

    #[test]
    fn explicit_data_dir_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(resolve_data_dir(Some(dir.path())), dir.path());
    }
}
