//! Command-line interface for heropath
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;
use std::rc::Rc;

use clap::{Parser, Subcommand};

use crate::app::{AppOptions, HeroPath};
use crate::backend::FileBackend;
use crate::clock::SystemClock;
use crate::config::{resolve_data_dir, Config};
use crate::error::Result;
use crate::events::{EventDestination, EventSink};
use crate::output::{HumanOutput, OutputOptions};
use crate::storage::Storage;

mod progress;
mod storage;
mod task;
mod xp;

pub use progress::ProgressCommands;
pub use storage::StorageCommands;
pub use task::TaskCommands;
pub use xp::XpCommands;

/// heropath - gamified task tracking
///
/// Complete tasks to earn XP, level up your hero and grow your skill tree.
#[derive(Parser, Debug)]
#[command(name = "heropath")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory holding heropath.toml and the store file
    #[arg(long, global = true, env = "HEROPATH_DATA")]
    pub data_dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit domain events as JSON lines to a file, or `-` for stdout
    #[arg(long, global = true)]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, complete and manage tasks
    #[command(subcommand)]
    Task(TaskCommands),

    /// Inspect and adjust hero progression
    #[command(subcommand)]
    Progress(ProgressCommands),

    /// XP curve calculations
    #[command(subcommand)]
    Xp(XpCommands),

    /// Storage usage, cleanup and reset
    #[command(subcommand)]
    Storage(StorageCommands),
}

/// Flags shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub data_dir: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
    pub events: Option<String>,
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let global = GlobalOptions {
            data_dir: self.data_dir,
            json: self.json,
            quiet: self.quiet,
            events: self.events,
        };
        match self.command {
            Commands::Task(cmd) => task::run(cmd, &global),
            Commands::Progress(cmd) => progress::run(cmd, &global),
            Commands::Xp(cmd) => xp::run(cmd, &global),
            Commands::Storage(cmd) => storage::run(cmd, &global),
        }
    }
}

/// An opened data directory: config, the application shell over the store
/// file, and the optional event sink.
pub(crate) struct Context {
    pub app: HeroPath<FileBackend>,
    pub data_dir: PathBuf,
    pub config: Config,
    sink: Option<EventSink>,
    events_to_stdout: bool,
    json: bool,
    quiet: bool,
}

impl Context {
    pub fn open(global: &GlobalOptions) -> Result<Self> {
        let data_dir = resolve_data_dir(global.data_dir.as_deref());
        std::fs::create_dir_all(&data_dir)?;

        let config = Config::load_from_dir(&data_dir);
        let options = AppOptions::from_config(&config)?;
        let backend = FileBackend::open(config.store_path(&data_dir))
            .with_capacity(config.quota.max_bytes);
        let storage = Storage::with_prefix(backend, config.storage.prefix.clone());
        let app = HeroPath::open(storage, Rc::new(SystemClock), options);

        let destination = EventDestination::parse(global.events.as_deref());
        let events_to_stdout = matches!(destination, Some(EventDestination::Stdout));
        let sink = destination.map(|d| d.open()).transpose()?;

        tracing::debug!(data_dir = %data_dir.display(), "opened data directory");

        Ok(Self {
            app,
            data_dir,
            config,
            sink,
            events_to_stdout,
            json: global.json,
            quiet: global.quiet,
        })
    }

    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json && !self.events_to_stdout,
            quiet: self.quiet || self.events_to_stdout,
        }
    }

    /// Flush pending writes, emit recorded events and attach any warnings
    /// to `human`. Runs once per invocation, the process-exit counterpart
    /// of an unload signal. A failed write fails the command before any
    /// event is emitted.
    pub fn finish(&mut self, human: &mut HumanOutput) -> Result<()> {
        let written = self.app.on_unload()?;
        tracing::debug!(written, "flushed pending writes");

        let events = self.app.take_events();
        if let Some(sink) = self.sink.as_mut() {
            if let Err(err) = sink.emit_all(&events) {
                human.push_warning(format!("event output failed: {err}"));
            }
        }

        let status = self.app.quota().check_quota(self.app.storage());
        if status.warning {
            human.push_warning(format!(
                "storage is at {:.0}% of its quota",
                status.usage * 100.0
            ));
            human.push_next_step("heropath storage cleanup");
        }
        Ok(())
    }
}

/// Standalone output options for commands that do not open a data
/// directory.
pub(crate) fn output_options(global: &GlobalOptions) -> OutputOptions {
    OutputOptions {
        json: global.json,
        quiet: global.quiet,
    }
}
