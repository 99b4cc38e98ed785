//! heropath progress commands

use clap::Subcommand;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::progress::{SkillCategory, UserProgress};

use super::{Context, GlobalOptions};

/// Progress subcommands
#[derive(Subcommand, Debug)]
pub enum ProgressCommands {
    /// Show level, XP, streak, outfits and skills
    Show,

    /// Reset the completion streak to zero
    ResetStreak,

    /// Unlock an outfit for the hero
    UnlockOutfit {
        /// Outfit name
        name: String,
    },

    /// Wear an unlocked outfit
    Wear {
        /// Outfit name
        name: String,
    },

    /// Adjust a skill branch by a signed amount (never below zero)
    Skill {
        /// productivity, creativity, health, learning or social
        category: String,

        /// Amount to add; negative values subtract
        #[arg(allow_hyphen_values = true)]
        delta: i64,
    },
}

#[derive(Serialize)]
struct ProgressOutput<'a> {
    progress: &'a UserProgress,
    level_percentage: f64,
}

#[derive(Serialize)]
struct OutfitOutput<'a> {
    outfit: &'a str,
    changed: bool,
    current_outfit: &'a str,
    unlocked_outfits: &'a [String],
}

pub fn run(cmd: ProgressCommands, global: &GlobalOptions) -> Result<()> {
    let mut ctx = Context::open(global)?;
    match cmd {
        ProgressCommands::Show => {
            let mut human = HumanOutput::new("Hero progress");
            ctx.finish(&mut human)?;
            emit_progress(&ctx, "progress show", human)
        }
        ProgressCommands::ResetStreak => {
            ctx.app.reset_streak()?;
            let mut human = HumanOutput::new("Streak reset");
            ctx.finish(&mut human)?;
            emit_progress(&ctx, "progress reset-streak", human)
        }
        ProgressCommands::UnlockOutfit { name } => {
            if name.trim().is_empty() {
                return Err(Error::InvalidArgument(
                    "outfit name cannot be empty".to_string(),
                ));
            }
            let changed = ctx.app.unlock_outfit(&name)?;
            let header = if changed {
                "Outfit unlocked"
            } else {
                "Outfit already unlocked"
            };
            let mut human = HumanOutput::new(header);
            ctx.finish(&mut human)?;
            emit_outfit(&ctx, "progress unlock-outfit", name.trim(), changed, human)
        }
        ProgressCommands::Wear { name } => {
            let name = name.trim();
            let changed = ctx.app.set_current_outfit(name)?;
            let mut human = if changed {
                HumanOutput::new("Outfit changed")
            } else {
                let mut human = HumanOutput::new("Outfit not unlocked; nothing changed");
                human.push_next_step(format!("heropath progress unlock-outfit {name}"));
                human
            };
            ctx.finish(&mut human)?;
            emit_outfit(&ctx, "progress wear", name, changed, human)
        }
        ProgressCommands::Skill { category, delta } => {
            let category: SkillCategory = category.parse()?;
            ctx.app.update_skill(category, delta)?;
            let mut human = HumanOutput::new(format!("Skill {category} updated"));
            ctx.finish(&mut human)?;
            emit_progress(&ctx, "progress skill", human)
        }
    }
}

fn emit_progress(ctx: &Context, command: &str, mut human: HumanOutput) -> Result<()> {
    let progress = ctx.app.progress();
    let level_percentage = progress.level_percentage();

    human.push_summary("Level", progress.level.to_string());
    human.push_summary(
        "XP",
        format!(
            "{}/{} ({level_percentage:.2}%)",
            progress.current_xp, progress.xp_to_next_level
        ),
    );
    human.push_summary("Total XP", progress.total_xp.to_string());
    human.push_summary("Completed tasks", progress.completed_tasks_count.to_string());
    human.push_summary("Streak", progress.streak.to_string());
    human.push_summary("Outfit", progress.hero_character.current_outfit.clone());
    human.push_summary(
        "Unlocked outfits",
        progress.hero_character.unlocked_outfits.join(", "),
    );
    for category in SkillCategory::all() {
        human.push_detail(format!("{category}: {}", progress.skill_tree.get(category)));
    }

    let output = ProgressOutput {
        progress,
        level_percentage,
    };
    emit_success(ctx.output(), command, &output, Some(&human))
}

fn emit_outfit(
    ctx: &Context,
    command: &str,
    outfit: &str,
    changed: bool,
    mut human: HumanOutput,
) -> Result<()> {
    let hero = &ctx.app.progress().hero_character;
    human.push_summary("Outfit", outfit.to_string());
    human.push_summary("Wearing", hero.current_outfit.clone());

    let output = OutfitOutput {
        outfit,
        changed,
        current_outfit: &hero.current_outfit,
        unlocked_outfits: &hero.unlocked_outfits,
    };
    emit_success(ctx.output(), command, &output, Some(&human))
}
