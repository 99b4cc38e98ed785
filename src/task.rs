//! Tasks and the task store.
//!
//! A task moves Draft -> Active -> Completed <-> Active and may be removed at
//! any point. Drafts are validated before they become tasks; a bad draft is
//! not an error for the caller but a message kept in
//! [`TaskStore::last_error`] while the task list stays untouched.
//!
//! Completing a task publishes a [`TaskCompleted`] event to a
//! [`CompletionListener`] before the completed state is committed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::events::{CompletionListener, TaskCompleted, TaskReopened};

pub type TaskId = String;

pub const TITLE_MIN_CHARS: usize = 3;
pub const TITLE_MAX_CHARS: usize = 120;
pub const DESCRIPTION_MAX_CHARS: usize = 2000;
pub const CATEGORY_MAX_CHARS: usize = 50;
pub const STORY_CHAPTER_MAX_CHARS: usize = 100;
pub const XP_VALUE_MIN: i64 = 1;
pub const XP_VALUE_MAX: i64 = 1000;

// =============================================================================
// Enumerations
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn all() -> [Difficulty; 3] {
        [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard]
    }

    /// Default XP awarded on completion.
    pub fn xp_value(self) -> u32 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Medium => 25,
            Difficulty::Hard => 50,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Display label with the XP value, e.g. `Easy (10 XP)`.
    pub fn label(self) -> String {
        let name = match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        };
        format!("{name} ({} XP)", self.xp_value())
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(Error::InvalidDifficulty(raw.to_string())),
        }
    }
}

/// Free-form mood tag; no effect on progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionalState {
    Excited,
    Calm,
    Challenged,
    Satisfied,
}

impl FromStr for EmotionalState {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "excited" => Ok(EmotionalState::Excited),
            "calm" => Ok(EmotionalState::Calm),
            "challenged" => Ok(EmotionalState::Challenged),
            "satisfied" => Ok(EmotionalState::Satisfied),
            _ => Err(Error::InvalidArgument(format!(
                "unknown emotional state '{raw}' (expected excited|calm|challenged|satisfied)"
            ))),
        }
    }
}

// =============================================================================
// Task
// =============================================================================

fn default_xp_value() -> u32 {
    Difficulty::Medium.xp_value()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub completed: bool,
    /// Epoch milliseconds
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default = "default_xp_value")]
    pub xp_value: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotional_state: Option<EmotionalState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_chapter: Option<String>,
}

impl Task {
    /// Case-insensitive category match.
    pub fn in_category(&self, category: &str) -> bool {
        self.category
            .as_deref()
            .map(|c| c.eq_ignore_ascii_case(category.trim()))
            .unwrap_or(false)
    }
}

// =============================================================================
// Drafts and updates
// =============================================================================

/// User input for a new task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub emotional_state: Option<EmotionalState>,
    #[serde(default)]
    pub story_chapter: Option<String>,
    #[serde(default)]
    pub xp_value: Option<i64>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn emotional_state(mut self, state: EmotionalState) -> Self {
        self.emotional_state = Some(state);
        self
    }

    pub fn story_chapter(mut self, chapter: impl Into<String>) -> Self {
        self.story_chapter = Some(chapter.into());
        self
    }

    pub fn xp_value(mut self, xp: i64) -> Self {
        self.xp_value = Some(xp);
        self
    }
}

/// Partial changes to an existing task. `None` leaves a field alone; an
/// empty string clears an optional text field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub xp_value: Option<i64>,
    pub category: Option<String>,
    pub emotional_state: Option<EmotionalState>,
    pub story_chapter: Option<String>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        *self == TaskUpdate::default()
    }
}

fn validate_title(raw: &str) -> Result<String> {
    let title = raw.trim();
    let len = title.chars().count();
    if len < TITLE_MIN_CHARS {
        return Err(Error::Validation(format!(
            "Task title must be at least {TITLE_MIN_CHARS} characters"
        )));
    }
    if len > TITLE_MAX_CHARS {
        return Err(Error::Validation(format!(
            "Task title is too long (max {TITLE_MAX_CHARS} chars)"
        )));
    }
    Ok(title.to_string())
}

/// Trim an optional text field; empty after trimming becomes `None`.
fn validate_optional(raw: Option<&str>, max: usize, label: &str) -> Result<Option<String>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.chars().count() > max {
        return Err(Error::Validation(format!(
            "{label} is too long (max {max} chars)"
        )));
    }
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

fn validate_xp(raw: Option<i64>) -> Result<Option<u32>> {
    match raw {
        None => Ok(None),
        Some(xp) if (XP_VALUE_MIN..=XP_VALUE_MAX).contains(&xp) => Ok(Some(xp as u32)),
        Some(_) => Err(Error::Validation(format!(
            "XP value must be between {XP_VALUE_MIN} and {XP_VALUE_MAX}"
        ))),
    }
}

// =============================================================================
// Store
// =============================================================================

/// Persisted `{tasks, lastError?}` record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TasksRecord {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// What a toggle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggled {
    Completed(TaskCompleted),
    Reopened(TaskReopened),
}

/// Owner of the task list. Newest tasks come first.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    last_error: Option<String>,
    default_difficulty: Difficulty,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrate from a stored record. `completed` and `completed_at` are
    /// made to agree; a completed task missing its timestamp falls back to
    /// its creation time.
    pub fn from_record(record: TasksRecord) -> Self {
        let mut tasks = record.tasks;
        for task in &mut tasks {
            match (task.completed, task.completed_at) {
                (true, None) => task.completed_at = Some(task.created_at),
                (false, Some(_)) => task.completed_at = None,
                _ => {}
            }
        }
        Self {
            tasks,
            last_error: record.last_error,
            default_difficulty: Difficulty::default(),
        }
    }

    /// Difficulty applied to drafts that do not name one.
    pub fn with_default_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.default_difficulty = difficulty;
        self
    }

    pub fn record(&self) -> TasksRecord {
        TasksRecord {
            tasks: self.tasks.clone(),
            last_error: self.last_error.clone(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Resolve a full id or a unique id prefix (case-insensitive).
    pub fn resolve_task_id(&self, input: &str) -> Result<TaskId> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
        }
        let needle = trimmed.to_ascii_lowercase();

        if let Some(task) = self.tasks.iter().find(|t| t.id.eq_ignore_ascii_case(&needle)) {
            return Ok(task.id.clone());
        }

        let mut matches: Vec<&str> = self
            .tasks
            .iter()
            .filter(|t| t.id.to_ascii_lowercase().starts_with(&needle))
            .map(|t| t.id.as_str())
            .collect();
        matches.sort_unstable();

        match matches.as_slice() {
            [] => Err(Error::TaskNotFound(trimmed.to_string())),
            [only] => Ok((*only).to_string()),
            many => Err(Error::InvalidArgument(format!(
                "ambiguous task id '{}': {}",
                trimmed,
                many.join(", ")
            ))),
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Validate `draft` and prepend the resulting task.
    ///
    /// Returns the new task's id, or `None` after recording the first
    /// validation message in `last_error`.
    pub fn add_task(&mut self, draft: TaskDraft, now_ms: i64) -> Option<TaskId> {
        match self.build_task(draft, now_ms) {
            Ok(task) => {
                let id = task.id.clone();
                self.tasks.insert(0, task);
                self.last_error = None;
                Some(id)
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                None
            }
        }
    }

    fn build_task(&self, draft: TaskDraft, now_ms: i64) -> Result<Task> {
        let title = validate_title(&draft.title)?;
        let description =
            validate_optional(draft.description.as_deref(), DESCRIPTION_MAX_CHARS, "Description")?;
        let category = validate_optional(draft.category.as_deref(), CATEGORY_MAX_CHARS, "Category")?;
        let story_chapter = validate_optional(
            draft.story_chapter.as_deref(),
            STORY_CHAPTER_MAX_CHARS,
            "Story chapter",
        )?;
        let explicit_xp = validate_xp(draft.xp_value)?;
        let difficulty = draft.difficulty.unwrap_or(self.default_difficulty);

        Ok(Task {
            id: Uuid::new_v4().to_string(),
            title,
            description,
            completed: false,
            created_at: now_ms,
            completed_at: None,
            xp_value: explicit_xp.unwrap_or_else(|| difficulty.xp_value()),
            difficulty,
            category,
            emotional_state: draft.emotional_state,
            story_chapter,
        })
    }

    /// Flip a task's completion state.
    ///
    /// Active -> Completed notifies `listener` with the task's XP and
    /// category before the new state is committed. Completed -> Active only
    /// flips local state; the listener sees a reopen notice and nothing
    /// granted earlier is taken back. Unknown ids are a no-op.
    pub fn toggle_task(
        &mut self,
        id: &str,
        now_ms: i64,
        listener: &mut dyn CompletionListener,
    ) -> Option<Toggled> {
        let index = self.tasks.iter().position(|t| t.id == id)?;

        let mut next = self.tasks[index].clone();
        let toggled = if next.completed {
            next.completed = false;
            next.completed_at = None;
            let event = TaskReopened {
                task_id: next.id.clone(),
                xp_value: next.xp_value,
                category: next.category.clone(),
            };
            listener.on_task_reopened(&event);
            Toggled::Reopened(event)
        } else {
            next.completed = true;
            next.completed_at = Some(now_ms);
            let event = TaskCompleted {
                task_id: next.id.clone(),
                xp_value: next.xp_value,
                category: next.category.clone(),
            };
            listener.on_task_completed(&event);
            Toggled::Completed(event)
        };

        self.tasks[index] = next;
        Some(toggled)
    }

    /// Apply `update` to the task `id`.
    ///
    /// Returns `false` when the task does not exist or the merged task fails
    /// validation (the message lands in `last_error`). A difficulty change
    /// without an explicit XP value recomputes the XP value.
    pub fn update_task(&mut self, id: &str, update: TaskUpdate) -> bool {
        let Some(index) = self.tasks.iter().position(|t| t.id == id) else {
            return false;
        };

        match merge_update(&self.tasks[index], update) {
            Ok(next) => {
                self.tasks[index] = next;
                self.last_error = None;
                true
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                false
            }
        }
    }

    pub fn remove_task(&mut self, id: &str) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(index))
    }

    /// Drop every completed task. Returns how many were removed.
    pub fn clear_completed(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !t.completed);
        before - self.tasks.len()
    }

    /// Tasks whose category matches `category`, ignoring case.
    pub fn tasks_by_category(&self, category: &str) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.in_category(category)).collect()
    }

    pub fn tasks_by_difficulty(&self, difficulty: Difficulty) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.difficulty == difficulty)
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.completed).count()
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    /// Forget every task and the last error.
    pub fn reset(&mut self) {
        self.tasks.clear();
        self.last_error = None;
    }
}

fn merge_update(current: &Task, update: TaskUpdate) -> Result<Task> {
    let mut next = current.clone();

    if let Some(title) = update.title {
        next.title = validate_title(&title)?;
    }
    if let Some(description) = update.description {
        next.description =
            validate_optional(Some(&description), DESCRIPTION_MAX_CHARS, "Description")?;
    }
    if let Some(category) = update.category {
        next.category = validate_optional(Some(&category), CATEGORY_MAX_CHARS, "Category")?;
    }
    if let Some(chapter) = update.story_chapter {
        next.story_chapter =
            validate_optional(Some(&chapter), STORY_CHAPTER_MAX_CHARS, "Story chapter")?;
    }
    if let Some(state) = update.emotional_state {
        next.emotional_state = Some(state);
    }

    let explicit_xp = validate_xp(update.xp_value)?;
    if let Some(difficulty) = update.difficulty {
        if difficulty != current.difficulty && explicit_xp.is_none() {
            next.xp_value = difficulty.xp_value();
        }
        next.difficulty = difficulty;
    }
    if let Some(xp) = explicit_xp {
        next.xp_value = xp;
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        completed: Vec<TaskCompleted>,
        reopened: Vec<TaskReopened>,
    }

    impl CompletionListener for Recorder {
        fn on_task_completed(&mut self, event: &TaskCompleted) {
            self.completed.push(event.clone());
        }

        fn on_task_reopened(&mut self, event: &TaskReopened) {
            self.reopened.push(event.clone());
        }
    }

    fn add(store: &mut TaskStore, draft: TaskDraft) -> TaskId {
        store.add_task(draft, 1_000).expect("valid draft")
    }

    #[test]
    fn title_length_bounds() {
        let mut store = TaskStore::new();
        assert!(store.add_task(TaskDraft::new("ab"), 0).is_none());
        assert_eq!(
            store.last_error(),
            Some("Task title must be at least 3 characters")
        );
        assert!(store.tasks().is_empty());

        assert!(store.add_task(TaskDraft::new("abc"), 0).is_some());
        assert_eq!(store.last_error(), None);

        assert!(store.add_task(TaskDraft::new("x".repeat(121)), 0).is_none());
        assert_eq!(
            store.last_error(),
            Some("Task title is too long (max 120 chars)")
        );
        assert_eq!(store.tasks().len(), 1);
    }

    #[test]
    fn title_is_trimmed_before_measuring() {
        let mut store = TaskStore::new();
        assert!(store.add_task(TaskDraft::new("   ab   "), 0).is_none());
        let id = add(&mut store, TaskDraft::new("  Write report  "));
        assert_eq!(store.get(&id).unwrap().title, "Write report");
    }

    #[test]
    fn new_tasks_are_prepended_with_defaults() {
        let mut store = TaskStore::new();
        let first = add(&mut store, TaskDraft::new("First task"));
        let second = add(
            &mut store,
            TaskDraft::new("Second task")
                .description("   ")
                .category("  Health ")
                .difficulty(Difficulty::Hard),
        );

        assert_eq!(store.tasks()[0].id, second);
        assert_eq!(store.tasks()[1].id, first);

        let task = store.get(&first).unwrap();
        assert_eq!(task.difficulty, Difficulty::Medium);
        assert_eq!(task.xp_value, 25);
        assert!(!task.completed);
        assert_eq!(task.created_at, 1_000);

        let task = store.get(&second).unwrap();
        assert_eq!(task.description, None);
        assert_eq!(task.category.as_deref(), Some("Health"));
        assert_eq!(task.xp_value, 50);
    }

    #[test]
    fn explicit_xp_wins_and_is_bounded() {
        let mut store = TaskStore::new();
        let id = add(
            &mut store,
            TaskDraft::new("Big one").difficulty(Difficulty::Easy).xp_value(300),
        );
        assert_eq!(store.get(&id).unwrap().xp_value, 300);

        assert!(store.add_task(TaskDraft::new("Zero xp").xp_value(0), 0).is_none());
        assert!(store.add_task(TaskDraft::new("Too much").xp_value(1001), 0).is_none());
        assert_eq!(
            store.last_error(),
            Some("XP value must be between 1 and 1000")
        );
    }

    #[test]
    fn optional_field_limits() {
        let mut store = TaskStore::new();
        assert!(store
            .add_task(TaskDraft::new("Task").description("d".repeat(2001)), 0)
            .is_none());
        assert!(store
            .add_task(TaskDraft::new("Task").category("c".repeat(51)), 0)
            .is_none());
        assert_eq!(store.last_error(), Some("Category is too long (max 50 chars)"));
        assert!(store
            .add_task(TaskDraft::new("Task").story_chapter("s".repeat(101)), 0)
            .is_none());
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn default_difficulty_is_configurable() {
        let mut store = TaskStore::new().with_default_difficulty(Difficulty::Easy);
        let id = add(&mut store, TaskDraft::new("Quick one"));
        assert_eq!(store.get(&id).unwrap().xp_value, 10);
    }

    #[test]
    fn toggle_publishes_completion_then_reopen() {
        let mut store = TaskStore::new();
        let id = add(
            &mut store,
            TaskDraft::new("Run 5k").difficulty(Difficulty::Hard).category("Health"),
        );
        let mut recorder = Recorder::default();

        let toggled = store.toggle_task(&id, 2_000, &mut recorder).unwrap();
        assert!(matches!(toggled, Toggled::Completed(_)));
        let task = store.get(&id).unwrap();
        assert!(task.completed);
        assert_eq!(task.completed_at, Some(2_000));
        assert_eq!(recorder.completed.len(), 1);
        assert_eq!(recorder.completed[0].xp_value, 50);
        assert_eq!(recorder.completed[0].category.as_deref(), Some("Health"));

        let toggled = store.toggle_task(&id, 3_000, &mut recorder).unwrap();
        assert!(matches!(toggled, Toggled::Reopened(_)));
        let task = store.get(&id).unwrap();
        assert!(!task.completed);
        assert_eq!(task.completed_at, None);
        assert_eq!(recorder.reopened.len(), 1);
        assert_eq!(recorder.completed.len(), 1);
    }

    #[test]
    fn toggle_unknown_id_is_noop() {
        let mut store = TaskStore::new();
        add(&mut store, TaskDraft::new("Something"));
        let mut recorder = Recorder::default();
        assert!(store.toggle_task("missing", 0, &mut recorder).is_none());
        assert!(recorder.completed.is_empty());
    }

    #[test]
    fn update_recomputes_xp_on_difficulty_change() {
        let mut store = TaskStore::new();
        let id = add(&mut store, TaskDraft::new("Refactor"));

        assert!(store.update_task(
            &id,
            TaskUpdate {
                difficulty: Some(Difficulty::Hard),
                ..TaskUpdate::default()
            }
        ));
        assert_eq!(store.get(&id).unwrap().xp_value, 50);

        assert!(store.update_task(
            &id,
            TaskUpdate {
                difficulty: Some(Difficulty::Easy),
                xp_value: Some(77),
                ..TaskUpdate::default()
            }
        ));
        let task = store.get(&id).unwrap();
        assert_eq!(task.difficulty, Difficulty::Easy);
        assert_eq!(task.xp_value, 77);
    }

    #[test]
    fn invalid_update_leaves_task_untouched() {
        let mut store = TaskStore::new();
        let id = add(&mut store, TaskDraft::new("Keep me").category("work"));
        let before = store.get(&id).unwrap().clone();

        assert!(!store.update_task(
            &id,
            TaskUpdate {
                title: Some("no".to_string()),
                category: Some("learning".to_string()),
                ..TaskUpdate::default()
            }
        ));
        assert_eq!(store.get(&id).unwrap(), &before);
        assert!(store.last_error().is_some());

        assert!(!store.update_task("missing", TaskUpdate::default()));
    }

    #[test]
    fn update_can_clear_optional_fields() {
        let mut store = TaskStore::new();
        let id = add(&mut store, TaskDraft::new("Notes").description("some text"));
        assert!(store.update_task(
            &id,
            TaskUpdate {
                description: Some(String::new()),
                ..TaskUpdate::default()
            }
        ));
        assert_eq!(store.get(&id).unwrap().description, None);
    }

    #[test]
    fn remove_and_clear_completed() {
        let mut store = TaskStore::new();
        let a = add(&mut store, TaskDraft::new("Task A"));
        let b = add(&mut store, TaskDraft::new("Task B"));
        let c = add(&mut store, TaskDraft::new("Task C"));
        let mut recorder = Recorder::default();
        store.toggle_task(&a, 0, &mut recorder);
        store.toggle_task(&b, 0, &mut recorder);

        assert_eq!(store.remove_task(&c).map(|t| t.title), Some("Task C".to_string()));
        assert!(store.remove_task(&c).is_none());
        assert_eq!(store.clear_completed(), 2);
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn projections_by_category_and_difficulty() {
        let mut store = TaskStore::new();
        add(&mut store, TaskDraft::new("Gym").category("Health"));
        add(&mut store, TaskDraft::new("Salad").category("health").difficulty(Difficulty::Easy));
        add(&mut store, TaskDraft::new("Read book").category("Learning"));

        assert_eq!(store.tasks_by_category("HEALTH").len(), 2);
        assert_eq!(store.tasks_by_category("heal").len(), 0);
        assert_eq!(store.tasks_by_difficulty(Difficulty::Easy).len(), 1);
        assert_eq!(store.tasks_by_difficulty(Difficulty::Medium).len(), 2);
    }

    #[test]
    fn record_uses_camel_case_fields() {
        let mut store = TaskStore::new();
        add(&mut store, TaskDraft::new("Serialize me").emotional_state(EmotionalState::Calm));
        store.add_task(TaskDraft::new("no"), 0);

        let json = serde_json::to_value(store.record()).unwrap();
        assert!(json["lastError"].is_string());
        let task = &json["tasks"][0];
        assert_eq!(task["xpValue"], 25);
        assert_eq!(task["emotionalState"], "calm");
        assert!(task.get("completedAt").is_none());

        let restored: TasksRecord = serde_json::from_value(json).unwrap();
        assert_eq!(TaskStore::from_record(restored).tasks().len(), 1);
    }

    #[test]
    fn resolve_task_id_accepts_unique_prefix() {
        let mut store = TaskStore::new();
        let id = add(&mut store, TaskDraft::new("Only task"));

        assert_eq!(store.resolve_task_id(&id).unwrap(), id);
        assert_eq!(store.resolve_task_id(&id[..8].to_uppercase()).unwrap(), id);
        assert!(matches!(
            store.resolve_task_id("zzzz"),
            Err(Error::TaskNotFound(_))
        ));
        assert!(matches!(
            store.resolve_task_id("  "),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn resolve_task_id_rejects_ambiguous_prefix() {
        let task = |id: &str| Task {
            id: id.to_string(),
            title: "Same prefix".to_string(),
            description: None,
            completed: false,
            created_at: 0,
            completed_at: None,
            xp_value: 25,
            difficulty: Difficulty::Medium,
            category: None,
            emotional_state: None,
            story_chapter: None,
        };
        let store = TaskStore::from_record(TasksRecord {
            tasks: vec![task("abc-1"), task("abc-2")],
            last_error: None,
        });
        let err = store.resolve_task_id("abc").unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
        assert_eq!(store.resolve_task_id("abc-2").unwrap(), "abc-2");
    }

    #[test]
    fn hydration_pairs_completed_with_timestamp() {
        let task = |id: &str, completed: bool, completed_at: Option<i64>| Task {
            id: id.to_string(),
            title: "Loaded task".to_string(),
            description: None,
            completed,
            created_at: 40,
            completed_at,
            xp_value: 25,
            difficulty: Difficulty::Medium,
            category: None,
            emotional_state: None,
            story_chapter: None,
        };
        let store = TaskStore::from_record(TasksRecord {
            tasks: vec![
                task("done-no-stamp", true, None),
                task("open-with-stamp", false, Some(99)),
                task("done", true, Some(70)),
            ],
            last_error: None,
        });

        assert_eq!(store.get("done-no-stamp").unwrap().completed_at, Some(40));
        assert_eq!(store.get("open-with-stamp").unwrap().completed_at, None);
        assert_eq!(store.get("done").unwrap().completed_at, Some(70));
    }

    #[test]
    fn difficulty_parsing_and_labels() {
        assert_eq!(" Hard ".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("extreme".parse::<Difficulty>().is_err());
        assert_eq!(Difficulty::Easy.label(), "Easy (10 XP)");
        assert_eq!(Difficulty::all().len(), 3);
        assert!("bored".parse::<EmotionalState>().is_err());
    }
}
