//! Application shell.
//!
//! [`HeroPath`] owns the task store, the progress store and one persistent
//! adapter for each. It is the single writer for both entities: every
//! mutation goes through one of its methods, which routes task completions
//! into the progress store, records domain events and persists whatever
//! changed. Callers hold the shell and pass it around explicitly.

use std::rc::Rc;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::backend::KvBackend;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{Event, EventKind};
use crate::migration::{progress_store_migrations, task_store_migrations, version_key};
use crate::persist::PersistAdapter;
use crate::progress::{ProgressRecord, ProgressStore, SkillCategory, UserProgress};
use crate::quota::{QuotaManager, QuotaStatus, QuotaUsage};
use crate::storage::Storage;
use crate::task::{Difficulty, Task, TaskDraft, TaskId, TaskStore, TaskUpdate, TasksRecord, Toggled};

/// Record key names, relative to the storage prefix.
pub const TASKS_RECORD: &str = "tasks.v1";
pub const PROGRESS_RECORD: &str = "progress.v1";

/// Knobs for opening the shell.
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// `None` writes straight through.
    pub debounce_delay_ms: Option<i64>,
    pub quota: QuotaManager,
    pub default_difficulty: Difficulty,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            debounce_delay_ms: Some(crate::debounce::DEFAULT_DEBOUNCE_DELAY_MS),
            quota: QuotaManager::default(),
            default_difficulty: Difficulty::default(),
        }
    }
}

impl AppOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            debounce_delay_ms: config
                .storage
                .debounce
                .then_some(config.storage.debounce_delay_ms),
            quota: QuotaManager::from_config(&config.quota)?,
            default_difficulty: config.tasks.difficulty()?,
        })
    }
}

/// Combined view of the storage layer's state.
#[derive(Debug, Clone, Serialize)]
pub struct StorageHealth {
    pub available: bool,
    pub usage: QuotaUsage,
    pub quota: QuotaStatus,
    pub tasks_version: u32,
    pub progress_version: u32,
    pub pending_writes: usize,
    pub last_error: Option<String>,
}

pub struct HeroPath<B> {
    storage: Storage<B>,
    clock: Rc<dyn Clock>,
    quota: QuotaManager,
    tasks: TaskStore,
    progress: ProgressStore,
    tasks_adapter: PersistAdapter<B>,
    progress_adapter: PersistAdapter<B>,
    default_difficulty: Difficulty,
    events: Vec<Event>,
}

fn warn_on_quota(err: &Error) {
    if err.is_quota_exceeded() {
        warn!(error = %err, "storage quota exceeded; consider `heropath storage cleanup`");
    }
}

impl<B: KvBackend + Clone> HeroPath<B> {
    /// Open both stores over `storage`, hydrating them from persisted
    /// records. Missing or unreadable records start from defaults.
    pub fn open(storage: Storage<B>, clock: Rc<dyn Clock>, options: AppOptions) -> Self {
        let adapter = |name: &str, migrator| {
            let adapter = PersistAdapter::new(
                storage.clone(),
                storage.prefixed(name),
                migrator,
                Rc::clone(&clock),
            )
            .with_quota(options.quota.clone())
            .with_error_callback(Box::new(warn_on_quota));
            match options.debounce_delay_ms {
                Some(delay) => adapter.with_debounce(delay),
                None => adapter,
            }
        };
        let mut tasks_adapter = adapter(TASKS_RECORD, task_store_migrations());
        let mut progress_adapter = adapter(PROGRESS_RECORD, progress_store_migrations());

        let tasks = tasks_adapter
            .load::<TasksRecord>()
            .map(TaskStore::from_record)
            .unwrap_or_default()
            .with_default_difficulty(options.default_difficulty);
        let progress = progress_adapter
            .load::<ProgressRecord>()
            .map(ProgressStore::from_record)
            .unwrap_or_default();

        debug!(
            tasks = tasks.tasks().len(),
            level = progress.progress().level,
            "hydrated stores"
        );

        Self {
            quota: options.quota,
            default_difficulty: options.default_difficulty,
            storage,
            clock,
            tasks,
            progress,
            tasks_adapter,
            progress_adapter,
            events: Vec::new(),
        }
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn progress(&self) -> &UserProgress {
        self.progress.progress()
    }

    pub fn storage(&self) -> &Storage<B> {
        &self.storage
    }

    pub fn quota(&self) -> &QuotaManager {
        &self.quota
    }

    pub fn resolve_task_id(&self, input: &str) -> Result<TaskId> {
        self.tasks.resolve_task_id(input)
    }

    /// Domain events recorded since the last drain.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    fn record(&mut self, kind: EventKind, data: serde_json::Value) -> Result<()> {
        let event = Event::new(kind, self.clock.now_ms()).with_data(data)?;
        self.events.push(event);
        Ok(())
    }

    fn persist_tasks(&mut self) -> Result<()> {
        let record = self.tasks.record();
        self.tasks_adapter.save(&record)
    }

    fn persist_progress(&mut self) -> Result<()> {
        let record = self.progress.record();
        self.progress_adapter.save(&record)
    }

    // =========================================================================
    // Task operations
    // =========================================================================

    /// Add a task. `Ok(None)` means the draft was rejected; the message is
    /// in `tasks().last_error()`.
    pub fn add_task(&mut self, draft: TaskDraft) -> Result<Option<TaskId>> {
        let now = self.clock.now_ms();
        let id = self.tasks.add_task(draft, now);
        if let Some(task) = id.as_deref().and_then(|id| self.tasks.get(id)) {
            let data = json!({
                "id": task.id,
                "title": task.title,
                "difficulty": task.difficulty,
                "xpValue": task.xp_value,
            });
            self.record(EventKind::TaskCreated, data)?;
        }
        self.persist_tasks()?;
        Ok(id)
    }

    /// Flip a task's completion state. Completing credits the progress
    /// store before the task is committed; reopening keeps earned XP.
    pub fn toggle_task(&mut self, id: &str) -> Result<Option<Toggled>> {
        let now = self.clock.now_ms();
        let Some(toggled) = self.tasks.toggle_task(id, now, &mut self.progress) else {
            return Ok(None);
        };

        match &toggled {
            Toggled::Completed(event) => {
                self.record(EventKind::TaskCompleted, serde_json::to_value(event)?)?;
                for change in self.progress.take_level_ups() {
                    info!(from = change.from, to = change.to, "hero levelled up");
                    self.record(EventKind::LevelUp, serde_json::to_value(change)?)?;
                }
                self.persist_progress()?;
            }
            Toggled::Reopened(event) => {
                self.record(EventKind::TaskReopened, serde_json::to_value(event)?)?;
            }
        }
        self.persist_tasks()?;
        Ok(Some(toggled))
    }

    /// Apply a partial update. `Ok(false)` when the task is unknown or the
    /// update was rejected.
    pub fn update_task(&mut self, id: &str, update: TaskUpdate) -> Result<bool> {
        if self.tasks.get(id).is_none() {
            return Ok(false);
        }
        let updated = self.tasks.update_task(id, update);
        if updated {
            self.record(EventKind::TaskUpdated, json!({ "id": id }))?;
        }
        self.persist_tasks()?;
        Ok(updated)
    }

    pub fn remove_task(&mut self, id: &str) -> Result<Option<Task>> {
        let removed = self.tasks.remove_task(id);
        if let Some(task) = &removed {
            self.record(
                EventKind::TaskRemoved,
                json!({ "id": task.id, "title": task.title }),
            )?;
            self.persist_tasks()?;
        }
        Ok(removed)
    }

    pub fn clear_completed(&mut self) -> Result<usize> {
        let removed = self.tasks.clear_completed();
        if removed > 0 {
            self.record(EventKind::CompletedCleared, json!({ "removed": removed }))?;
            self.persist_tasks()?;
        }
        Ok(removed)
    }

    pub fn clear_task_error(&mut self) -> Result<()> {
        if self.tasks.last_error().is_some() {
            self.tasks.clear_error();
            self.persist_tasks()?;
        }
        Ok(())
    }

    // =========================================================================
    // Progress operations
    // =========================================================================

    pub fn reset_streak(&mut self) -> Result<()> {
        self.progress.reset_streak();
        self.record(EventKind::StreakReset, json!({}))?;
        self.persist_progress()
    }

    /// Returns `false` when the outfit was already unlocked.
    pub fn unlock_outfit(&mut self, name: &str) -> Result<bool> {
        let unlocked = self.progress.unlock_outfit(name);
        if unlocked {
            self.record(EventKind::OutfitUnlocked, json!({ "outfit": name.trim() }))?;
            self.persist_progress()?;
        }
        Ok(unlocked)
    }

    /// Returns `false` when the outfit is locked; nothing changes then.
    pub fn set_current_outfit(&mut self, name: &str) -> Result<bool> {
        let changed = self.progress.set_current_outfit(name);
        if changed {
            self.record(EventKind::OutfitChanged, json!({ "outfit": name.trim() }))?;
            self.persist_progress()?;
        }
        Ok(changed)
    }

    pub fn update_skill(&mut self, category: SkillCategory, delta: i64) -> Result<()> {
        self.progress.update_skill(category, delta);
        self.persist_progress()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Land debounced writes whose delay has elapsed.
    pub fn tick(&mut self) -> usize {
        self.tasks_adapter.run_due() + self.progress_adapter.run_due()
    }

    /// Write every pending record now. Both records are attempted; the
    /// first failure is returned.
    pub fn flush(&mut self) -> Result<usize> {
        let tasks = self.tasks_adapter.flush();
        let progress = self.progress_adapter.flush();
        Ok(tasks? + progress?)
    }

    pub fn on_visibility_hidden(&mut self) -> Result<usize> {
        self.flush()
    }

    pub fn on_unload(&mut self) -> Result<usize> {
        self.flush()
    }

    /// Drop every pending write.
    pub fn cancel_pending(&mut self) -> usize {
        self.tasks_adapter.cancel() + self.progress_adapter.cancel()
    }

    pub fn pending_writes(&self) -> usize {
        usize::from(self.tasks_adapter.has_pending())
            + usize::from(self.progress_adapter.has_pending())
    }

    /// Remove stale keys, keeping both records and their markers.
    pub fn cleanup(&self) -> usize {
        let own = [self.tasks_adapter.key(), self.progress_adapter.key()];
        let preserve = own
            .iter()
            .flat_map(|key| [key.to_string(), version_key(key)]);
        self.quota.cleanup(&self.storage, preserve)
    }

    /// Delete every key under the application prefix and restore initial
    /// state. Returns the number of keys removed.
    pub fn reset(&mut self) -> Result<usize> {
        self.cancel_pending();
        let removed = self.storage.clear_app_data();
        self.tasks = TaskStore::new().with_default_difficulty(self.default_difficulty);
        self.progress.reset();
        self.record(EventKind::DataCleared, json!({ "removed": removed }))?;
        info!(removed, "application data cleared");
        Ok(removed)
    }

    pub fn storage_health(&self) -> StorageHealth {
        StorageHealth {
            available: self.storage.is_available(),
            usage: self.quota.usage(&self.storage),
            quota: self.quota.check_quota(&self.storage),
            tasks_version: self.tasks_adapter.stored_version(),
            progress_version: self.progress_adapter.stored_version(),
            pending_writes: self.pending_writes(),
            last_error: self
                .tasks_adapter
                .last_error()
                .or_else(|| self.progress_adapter.last_error())
                .map(str::to_string),
        }
    }
}
