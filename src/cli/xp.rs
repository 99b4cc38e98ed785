//! heropath xp commands
//!
//! `xp table` is pure arithmetic; `xp needed` reads the hero's current total
//! unless one is given.

use clap::Subcommand;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::task::Difficulty;
use crate::xp::{self, LevelRow, LevelStanding};

use super::{output_options, Context, GlobalOptions};

/// XP subcommands
#[derive(Subcommand, Debug)]
pub enum XpCommands {
    /// Print per-level and cumulative XP requirements
    Table {
        /// Highest level to show
        #[arg(long, default_value_t = 10)]
        levels: u32,
    },

    /// How many tasks of each difficulty finish the current level
    Needed {
        /// Lifetime XP to evaluate (defaults to the hero's total)
        #[arg(long)]
        total_xp: Option<i64>,

        /// Only report this difficulty
        #[arg(long)]
        difficulty: Option<String>,
    },
}

#[derive(Serialize)]
struct TableOutput {
    levels: Vec<LevelRow>,
}

#[derive(Serialize)]
struct NeededRow {
    difficulty: Difficulty,
    xp_per_task: u32,
    tasks: u64,
}

#[derive(Serialize)]
struct NeededOutput {
    total_xp: i64,
    standing: LevelStanding,
    percentage: f64,
    needed: Vec<NeededRow>,
}

pub fn run(cmd: XpCommands, global: &GlobalOptions) -> Result<()> {
    match cmd {
        XpCommands::Table { levels } => run_table(levels, global),
        XpCommands::Needed {
            total_xp,
            difficulty,
        } => {
            let difficulty = difficulty
                .as_deref()
                .map(str::parse::<Difficulty>)
                .transpose()?;
            run_needed(total_xp, difficulty, global)
        }
    }
}

fn run_table(levels: u32, global: &GlobalOptions) -> Result<()> {
    if levels == 0 || levels > 100 {
        return Err(Error::InvalidArgument(
            "--levels must be between 1 and 100".to_string(),
        ));
    }
    let rows = xp::level_table(levels)?;

    let mut human = HumanOutput::new("XP table");
    for row in &rows {
        human.push_detail(format!(
            "level {:>3}: {:>8} XP to next, {:>9} XP cumulative",
            row.level, row.xp_required, row.cumulative_xp
        ));
    }
    emit_success(
        output_options(global),
        "xp table",
        &TableOutput { levels: rows },
        Some(&human),
    )
}

fn run_needed(
    total_xp: Option<i64>,
    difficulty: Option<Difficulty>,
    global: &GlobalOptions,
) -> Result<()> {
    let total_xp = match total_xp {
        Some(total) => total,
        None => {
            let ctx = Context::open(global)?;
            i64::try_from(ctx.app.progress().total_xp).unwrap_or(i64::MAX)
        }
    };

    let standing = xp::standing_for_total_xp(total_xp)?;
    let percentage = xp::level_progress_percentage(total_xp, standing.level)?;
    let difficulties = match difficulty {
        Some(d) => vec![d],
        None => Difficulty::all().to_vec(),
    };
    let needed = difficulties
        .into_iter()
        .map(|d| {
            Ok(NeededRow {
                difficulty: d,
                xp_per_task: xp::xp_for_difficulty(d),
                tasks: xp::tasks_needed_to_level_up(total_xp, standing.level, d)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut human = HumanOutput::new(format!("Level {}", standing.level));
    human.push_summary("Total XP", total_xp.to_string());
    human.push_summary(
        "Progress",
        format!(
            "{}/{} ({percentage:.2}%)",
            standing.current_xp, standing.xp_to_next_level
        ),
    );
    for row in &needed {
        human.push_detail(format!(
            "{}: {} task(s)",
            row.difficulty.label(),
            row.tasks
        ));
    }

    let output = NeededOutput {
        total_xp,
        standing,
        percentage,
        needed,
    };
    emit_success(output_options(global), "xp needed", &output, Some(&human))
}
