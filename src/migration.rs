//! Versioned data migrations for persisted records.
//!
//! Each persisted record has a companion `<key>.version` marker. When the
//! stored version is older than the migrator's current version, every
//! registered transform with `stored < version <= current` runs in ascending
//! order, each receiving the previous transform's output. A failing transform
//! aborts the whole migration: no marker is written and the caller keeps the
//! original data.
//!
//! ```ignore
//! let migrator = Migrator::new(3)
//!     .register(2, add_difficulty)
//!     .register(3, rename_field);
//! let data = migrator.migrate(&storage, &clock, "heropath.tasks.v1", data, 1)?;
//! ```

use std::fmt;

use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::backend::KvBackend;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::storage::Storage;

/// Current schema version of the tasks record.
pub const TASKS_RECORD_VERSION: u32 = 2;

/// Current schema version of the progress record.
pub const PROGRESS_RECORD_VERSION: u32 = 2;

/// A transform from the previous schema version to `version`.
pub type Transform = Box<dyn Fn(Value) -> anyhow::Result<Value>>;

/// Persisted `{version, timestamp}` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMarker {
    pub version: u32,
    pub timestamp: i64,
}

/// Companion key holding the version marker for `key`.
pub fn version_key(key: &str) -> String {
    format!("{key}.version")
}

struct Migration {
    version: u32,
    transform: Transform,
}

/// Ordered set of transforms targeting one current version.
pub struct Migrator {
    current_version: u32,
    migrations: Vec<Migration>,
}

impl fmt::Debug for Migrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migrator")
            .field("current_version", &self.current_version)
            .field(
                "migrations",
                &self.migrations.iter().map(|m| m.version).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Migrator {
    pub fn new(current_version: u32) -> Self {
        Self {
            current_version,
            migrations: Vec::new(),
        }
    }

    pub fn current_version(&self) -> u32 {
        self.current_version
    }

    /// Builder form of [`Migrator::add_migration`].
    pub fn register<F>(mut self, version: u32, transform: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + 'static,
    {
        self.add_migration(version, transform);
        self
    }

    /// Register the transform that produces schema `version`.
    pub fn add_migration<F>(&mut self, version: u32, transform: F)
    where
        F: Fn(Value) -> anyhow::Result<Value> + 'static,
    {
        self.migrations.push(Migration {
            version,
            transform: Box::new(transform),
        });
        // Stable sort keeps registration order for equal versions.
        self.migrations.sort_by_key(|m| m.version);
    }

    /// Versions that would run for data stored at `stored_version`.
    pub fn pending(&self, stored_version: u32) -> Vec<u32> {
        if stored_version >= self.current_version {
            return Vec::new();
        }
        self.migrations
            .iter()
            .map(|m| m.version)
            .filter(|v| *v > stored_version && *v <= self.current_version)
            .collect()
    }

    /// Bring `data` from `stored_version` up to the current version.
    ///
    /// On success the version marker for `key` is rewritten. On failure the
    /// error names the version whose transform failed; no marker is touched.
    pub fn migrate<B: KvBackend>(
        &self,
        storage: &Storage<B>,
        clock: &dyn Clock,
        key: &str,
        data: Value,
        stored_version: u32,
    ) -> Result<Value> {
        if stored_version >= self.current_version {
            return Ok(data);
        }
        let migrated = self.transform(key, data, stored_version)?;
        self.set_version(storage, clock, key, self.current_version)?;
        Ok(migrated)
    }

    /// Run the pending transforms over `data` without touching storage.
    /// The caller owns writing the record and then its marker.
    pub fn transform(&self, key: &str, data: Value, stored_version: u32) -> Result<Value> {
        let mut migrated = data;
        for migration in &self.migrations {
            if migration.version <= stored_version || migration.version > self.current_version {
                continue;
            }
            migrated = (migration.transform)(migrated).map_err(|err| {
                error!(key = %key, version = migration.version, error = %err, "migration failed");
                Error::MigrationFailed {
                    key: key.to_string(),
                    version: migration.version,
                    reason: format!("{err:#}"),
                }
            })?;
            info!(
                key = %key,
                from = stored_version,
                to = migration.version,
                "migrated record"
            );
        }
        Ok(migrated)
    }

    /// Version recorded for `key`, or 0 when no marker exists.
    pub fn stored_version<B: KvBackend>(&self, storage: &Storage<B>, key: &str) -> u32 {
        storage
            .get::<VersionMarker>(&version_key(key))
            .map(|marker| marker.version)
            .unwrap_or(0)
    }

    pub fn set_version<B: KvBackend>(
        &self,
        storage: &Storage<B>,
        clock: &dyn Clock,
        key: &str,
        version: u32,
    ) -> Result<()> {
        let marker = VersionMarker {
            version,
            timestamp: clock.now_ms(),
        };
        storage.set(&version_key(key), &marker)
    }
}

// =============================================================================
// Built-in record migrations
// =============================================================================

/// Migrations for the `{tasks, lastError?}` record.
pub fn task_store_migrations() -> Migrator {
    Migrator::new(TASKS_RECORD_VERSION).register(2, tasks_add_difficulty)
}

/// Migrations for the `{progress}` record.
pub fn progress_store_migrations() -> Migrator {
    Migrator::new(PROGRESS_RECORD_VERSION).register(2, progress_add_character_and_skills)
}

/// v2: tasks predating gamification get `difficulty = medium` and the
/// matching `xpValue`.
fn tasks_add_difficulty(data: Value) -> anyhow::Result<Value> {
    let Value::Object(mut record) = data else {
        bail!("tasks record is not an object");
    };

    let tasks = record
        .entry("tasks")
        .or_insert_with(|| Value::Array(Vec::new()));
    let tasks = tasks
        .as_array_mut()
        .ok_or_else(|| anyhow!("`tasks` is not an array"))?;

    for task in tasks.iter_mut() {
        let task = task
            .as_object_mut()
            .ok_or_else(|| anyhow!("task entry is not an object"))?;
        let difficulty = task
            .entry("difficulty")
            .or_insert_with(|| json!("medium"))
            .as_str()
            .unwrap_or("medium")
            .to_string();
        let default_xp = match difficulty.as_str() {
            "easy" => 10,
            "hard" => 50,
            _ => 25,
        };
        task.entry("xpValue").or_insert_with(|| json!(default_xp));
    }

    Ok(Value::Object(record))
}

/// v2: progress records gain the hero character, skill tree and streak.
fn progress_add_character_and_skills(data: Value) -> anyhow::Result<Value> {
    let Value::Object(mut record) = data else {
        bail!("progress record is not an object");
    };
    let progress = record
        .get_mut("progress")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| anyhow!("progress record has no `progress` object"))?;

    let level = progress.get("level").and_then(Value::as_u64).unwrap_or(1);

    fill(progress, "streak", json!(0));
    fill(progress, "completedTasksCount", json!(0));
    fill(
        progress,
        "heroCharacter",
        json!({
            "level": level,
            "appearance": "default",
            "unlockedOutfits": ["default"],
            "currentOutfit": "default",
        }),
    );
    fill(
        progress,
        "skillTree",
        json!({
            "productivity": 0,
            "creativity": 0,
            "health": 0,
            "learning": 0,
            "social": 0,
        }),
    );

    Ok(Value::Object(record))
}

fn fill(object: &mut Map<String, Value>, field: &str, default: Value) {
    object.entry(field).or_insert(default);
}
