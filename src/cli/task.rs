//! heropath task commands
//!
//! Thin dispatchers over [`HeroPath`](crate::app::HeroPath): parse flags,
//! call one shell operation, render the result.

use clap::Subcommand;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::progress::UserProgress;
use crate::task::{Difficulty, EmotionalState, Task, TaskDraft, TaskUpdate, Toggled};

use super::{Context, GlobalOptions};

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a new task
    Add {
        /// Task title (3-120 characters)
        title: String,

        /// Longer description
        #[arg(short, long)]
        description: Option<String>,

        /// easy, medium or hard (default from config)
        #[arg(long)]
        difficulty: Option<String>,

        /// Category; productivity, creativity, health, learning and social
        /// also feed the skill tree
        #[arg(short, long)]
        category: Option<String>,

        /// excited, calm, challenged or satisfied
        #[arg(long)]
        mood: Option<String>,

        /// Story chapter this task belongs to
        #[arg(long)]
        chapter: Option<String>,

        /// Explicit XP reward (1-1000), overrides the difficulty default
        #[arg(long)]
        xp: Option<i64>,
    },

    /// List tasks, newest first
    List {
        /// Only tasks in this category (case-insensitive)
        #[arg(short, long)]
        category: Option<String>,

        /// Only tasks of this difficulty
        #[arg(long)]
        difficulty: Option<String>,

        /// Only tasks not yet completed
        #[arg(long, conflicts_with = "completed")]
        active: bool,

        /// Only completed tasks
        #[arg(long)]
        completed: bool,
    },

    /// Complete an active task, or reopen a completed one
    Toggle {
        /// Task id or unique prefix
        id: String,
    },

    /// Edit task fields (pass an empty string to clear an optional field)
    Edit {
        /// Task id or unique prefix
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        difficulty: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(long)]
        mood: Option<String>,

        #[arg(long)]
        chapter: Option<String>,

        #[arg(long)]
        xp: Option<i64>,
    },

    /// Delete a task
    Remove {
        /// Task id or unique prefix
        id: String,
    },

    /// Delete every completed task
    ClearCompleted,
}

#[derive(Serialize)]
struct TaskOutput<'a> {
    task: &'a Task,
}

#[derive(Serialize)]
struct TaskListOutput<'a> {
    total: usize,
    tasks: Vec<&'a Task>,
}

#[derive(Serialize)]
struct ToggleOutput<'a> {
    task: &'a Task,
    completed: bool,
    xp_awarded: u32,
    progress: &'a UserProgress,
}

#[derive(Serialize)]
struct RemovedOutput {
    removed: usize,
    ids: Vec<String>,
}

pub fn run(cmd: TaskCommands, global: &GlobalOptions) -> Result<()> {
    match cmd {
        TaskCommands::Add {
            title,
            description,
            difficulty,
            category,
            mood,
            chapter,
            xp,
        } => {
            let draft = TaskDraft {
                title,
                description,
                difficulty: parse_difficulty(difficulty.as_deref())?,
                category,
                emotional_state: parse_mood(mood.as_deref())?,
                story_chapter: chapter,
                xp_value: xp,
            };
            run_add(draft, global)
        }
        TaskCommands::List {
            category,
            difficulty,
            active,
            completed,
        } => run_list(category, parse_difficulty(difficulty.as_deref())?, active, completed, global),
        TaskCommands::Toggle { id } => run_toggle(&id, global),
        TaskCommands::Edit {
            id,
            title,
            description,
            difficulty,
            category,
            mood,
            chapter,
            xp,
        } => {
            let update = TaskUpdate {
                title,
                description,
                difficulty: parse_difficulty(difficulty.as_deref())?,
                xp_value: xp,
                category,
                emotional_state: parse_mood(mood.as_deref())?,
                story_chapter: chapter,
            };
            run_edit(&id, update, global)
        }
        TaskCommands::Remove { id } => run_remove(&id, global),
        TaskCommands::ClearCompleted => run_clear_completed(global),
    }
}

fn parse_difficulty(raw: Option<&str>) -> Result<Option<Difficulty>> {
    raw.map(str::parse::<Difficulty>).transpose()
}

fn parse_mood(raw: Option<&str>) -> Result<Option<EmotionalState>> {
    raw.map(str::parse::<EmotionalState>).transpose()
}

fn task_line(task: &Task) -> String {
    let mark = if task.completed { "x" } else { " " };
    let mut line = format!(
        "[{mark}] {} {} ({}, {} XP)",
        short_id(&task.id),
        task.title,
        task.difficulty,
        task.xp_value
    );
    if let Some(category) = &task.category {
        line.push_str(&format!(" #{category}"));
    }
    line
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn run_add(draft: TaskDraft, global: &GlobalOptions) -> Result<()> {
    let mut ctx = Context::open(global)?;
    let created = ctx.app.add_task(draft)?;

    let mut human = HumanOutput::new("Task created");
    ctx.finish(&mut human)?;

    let Some(id) = created else {
        let message = ctx
            .app
            .tasks()
            .last_error()
            .unwrap_or("invalid task")
            .to_string();
        return Err(Error::Validation(message));
    };
    let task = ctx
        .app
        .tasks()
        .get(&id)
        .ok_or_else(|| Error::TaskNotFound(id.clone()))?;

    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());
    human.push_summary("Difficulty", task.difficulty.label());
    human.push_summary("XP", task.xp_value.to_string());
    human.push_next_step(format!("heropath task toggle {}", short_id(&task.id)));

    emit_success(ctx.output(), "task add", &TaskOutput { task }, Some(&human))
}

fn run_list(
    category: Option<String>,
    difficulty: Option<Difficulty>,
    active: bool,
    completed: bool,
    global: &GlobalOptions,
) -> Result<()> {
    let mut ctx = Context::open(global)?;
    let mut human = HumanOutput::new("Tasks");
    ctx.finish(&mut human)?;

    let store = ctx.app.tasks();
    let mut tasks: Vec<&Task> = match category.as_deref() {
        Some(category) => store.tasks_by_category(category),
        None => store.tasks().iter().collect(),
    };
    if let Some(difficulty) = difficulty {
        tasks.retain(|t| t.difficulty == difficulty);
    }
    if active {
        tasks.retain(|t| !t.completed);
    }
    if completed {
        tasks.retain(|t| t.completed);
    }

    human.push_summary("Total", tasks.len().to_string());
    human.push_summary("Active", store.active_count().to_string());
    human.push_summary("Completed", store.completed_count().to_string());
    if let Some(error) = store.last_error() {
        human.push_warning(format!("last error: {error}"));
    }
    for task in &tasks {
        human.push_detail(task_line(task));
    }

    let output = TaskListOutput {
        total: tasks.len(),
        tasks,
    };
    emit_success(ctx.output(), "task list", &output, Some(&human))
}

fn run_toggle(input: &str, global: &GlobalOptions) -> Result<()> {
    let mut ctx = Context::open(global)?;
    let id = ctx.app.resolve_task_id(input)?;
    let toggled = ctx
        .app
        .toggle_task(&id)?
        .ok_or_else(|| Error::TaskNotFound(input.to_string()))?;
    let levelled = ctx
        .app
        .events()
        .iter()
        .any(|e| e.event == crate::events::EventKind::LevelUp);

    let (header, xp_awarded) = match &toggled {
        Toggled::Completed(event) => ("Task completed", event.xp_value),
        Toggled::Reopened(_) => ("Task reopened", 0),
    };
    let mut human = HumanOutput::new(header);
    ctx.finish(&mut human)?;

    let task = ctx
        .app
        .tasks()
        .get(&id)
        .ok_or_else(|| Error::TaskNotFound(id.clone()))?;
    let progress = ctx.app.progress();

    human.push_summary("Task", task_line(task));
    if xp_awarded > 0 {
        human.push_summary("XP awarded", xp_awarded.to_string());
    }
    human.push_summary("Level", progress.level.to_string());
    human.push_summary(
        "XP",
        format!("{}/{}", progress.current_xp, progress.xp_to_next_level),
    );
    human.push_summary("Streak", progress.streak.to_string());
    if levelled {
        human.push_detail(format!("Level up! Your hero reached level {}", progress.level));
    }

    let output = ToggleOutput {
        task,
        completed: task.completed,
        xp_awarded,
        progress,
    };
    emit_success(ctx.output(), "task toggle", &output, Some(&human))
}

fn run_edit(input: &str, update: TaskUpdate, global: &GlobalOptions) -> Result<()> {
    if update.is_empty() {
        return Err(Error::InvalidArgument(
            "nothing to edit: pass at least one field flag".to_string(),
        ));
    }
    let mut ctx = Context::open(global)?;
    let id = ctx.app.resolve_task_id(input)?;
    let updated = ctx.app.update_task(&id, update)?;

    let mut human = HumanOutput::new("Task updated");
    ctx.finish(&mut human)?;

    if !updated {
        let message = ctx
            .app
            .tasks()
            .last_error()
            .unwrap_or("invalid update")
            .to_string();
        return Err(Error::Validation(message));
    }
    let task = ctx
        .app
        .tasks()
        .get(&id)
        .ok_or_else(|| Error::TaskNotFound(id.clone()))?;
    human.push_summary("Task", task_line(task));

    emit_success(ctx.output(), "task edit", &TaskOutput { task }, Some(&human))
}

fn run_remove(input: &str, global: &GlobalOptions) -> Result<()> {
    let mut ctx = Context::open(global)?;
    let id = ctx.app.resolve_task_id(input)?;
    let removed = ctx
        .app
        .remove_task(&id)?
        .ok_or_else(|| Error::TaskNotFound(input.to_string()))?;

    let mut human = HumanOutput::new("Task removed");
    ctx.finish(&mut human)?;
    human.push_summary("Task", task_line(&removed));

    let output = RemovedOutput {
        removed: 1,
        ids: vec![removed.id.clone()],
    };
    emit_success(ctx.output(), "task remove", &output, Some(&human))
}

fn run_clear_completed(global: &GlobalOptions) -> Result<()> {
    let mut ctx = Context::open(global)?;
    let before: Vec<String> = ctx
        .app
        .tasks()
        .tasks()
        .iter()
        .filter(|t| t.completed)
        .map(|t| t.id.clone())
        .collect();
    let removed = ctx.app.clear_completed()?;

    let mut human = HumanOutput::new("Completed tasks cleared");
    ctx.finish(&mut human)?;
    human.push_summary("Removed", removed.to_string());

    let output = RemovedOutput {
        removed,
        ids: before,
    };
    emit_success(ctx.output(), "task clear-completed", &output, Some(&human))
}
