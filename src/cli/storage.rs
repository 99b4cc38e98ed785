//! heropath storage commands

use clap::Subcommand;
use serde::Serialize;

use crate::app::StorageHealth;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};

use super::{Context, GlobalOptions};

/// Storage subcommands
#[derive(Subcommand, Debug)]
pub enum StorageCommands {
    /// Show quota usage, record versions and the last storage error
    Usage,

    /// Remove stale version markers and temporary keys
    Cleanup,

    /// Delete all heropath data in the store
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Serialize)]
struct UsageOutput {
    store: String,
    health: StorageHealth,
}

#[derive(Serialize)]
struct RemovedOutput {
    removed: usize,
}

pub fn run(cmd: StorageCommands, global: &GlobalOptions) -> Result<()> {
    match cmd {
        StorageCommands::Usage => run_usage(global),
        StorageCommands::Cleanup => run_cleanup(global),
        StorageCommands::Clear { yes } => run_clear(yes, global),
    }
}

fn run_usage(global: &GlobalOptions) -> Result<()> {
    let mut ctx = Context::open(global)?;
    let mut human = HumanOutput::new("Storage usage");
    ctx.finish(&mut human)?;

    let health = ctx.app.storage_health();
    let store = ctx.config.store_path(&ctx.data_dir);

    human.push_summary("Store", store.display().to_string());
    human.push_summary("Available", health.available.to_string());
    human.push_summary(
        "Used",
        format!(
            "{} / {} bytes ({:.2}%)",
            health.usage.current, health.usage.max, health.usage.percentage
        ),
    );
    human.push_summary("Tasks record version", health.tasks_version.to_string());
    human.push_summary(
        "Progress record version",
        health.progress_version.to_string(),
    );
    if let Some(error) = &health.last_error {
        human.push_warning(format!("last storage error: {error}"));
    }

    let output = UsageOutput {
        store: store.display().to_string(),
        health,
    };
    emit_success(ctx.output(), "storage usage", &output, Some(&human))
}

fn run_cleanup(global: &GlobalOptions) -> Result<()> {
    let mut ctx = Context::open(global)?;
    let removed = ctx.app.cleanup();

    let mut human = HumanOutput::new("Storage cleanup");
    ctx.finish(&mut human)?;
    human.push_summary("Removed", removed.to_string());

    emit_success(
        ctx.output(),
        "storage cleanup",
        &RemovedOutput { removed },
        Some(&human),
    )
}

fn run_clear(yes: bool, global: &GlobalOptions) -> Result<()> {
    if !yes {
        return Err(Error::InvalidArgument(
            "refusing to delete all data without --yes".to_string(),
        ));
    }
    let mut ctx = Context::open(global)?;
    let removed = ctx.app.reset()?;

    let mut human = HumanOutput::new("All heropath data cleared");
    ctx.finish(&mut human)?;
    human.push_summary("Removed keys", removed.to_string());

    emit_success(
        ctx.output(),
        "storage clear",
        &RemovedOutput { removed },
        Some(&human),
    )
}
