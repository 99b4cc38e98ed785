//! XP and leveling arithmetic.
//!
//! The curve is exponential: advancing from level `L` to `L + 1` costs
//! `floor(100 * 1.5^(L-1))` XP. Everything here is pure; stored XP is always
//! an integer and floating point only appears in intermediate results.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::task::Difficulty;

/// XP required to go from level 1 to level 2.
pub const BASE_XP: u64 = 100;

/// Growth factor between consecutive level requirements.
pub const XP_MULTIPLIER: f64 = 1.5;

/// XP awarded for a task of `difficulty`.
pub fn xp_for_difficulty(difficulty: Difficulty) -> u32 {
    difficulty.xp_value()
}

/// XP awarded for a difficulty given by name (`easy`, `medium`, `hard`).
pub fn xp_for_difficulty_name(name: &str) -> Result<u32> {
    Ok(name.parse::<Difficulty>()?.xp_value())
}

fn check_level(level: u32) -> Result<()> {
    if level < 1 {
        return Err(Error::InvalidLevel(i64::from(level)));
    }
    Ok(())
}

fn check_total(total_xp: i64) -> Result<()> {
    if total_xp < 0 {
        return Err(Error::NegativeXp(total_xp));
    }
    Ok(())
}

/// XP needed to advance from `level` to `level + 1`.
pub fn xp_required_for_level(level: u32) -> Result<u64> {
    check_level(level)?;
    let exponent = i32::try_from(level - 1).unwrap_or(i32::MAX);
    // `as` saturates, so absurd levels cap at u64::MAX instead of wrapping.
    Ok((BASE_XP as f64 * XP_MULTIPLIER.powi(exponent)).floor() as u64)
}

/// Total XP needed to reach `target_level` from level 1 with zero XP.
pub fn cumulative_xp_for_level(target_level: u32) -> Result<u64> {
    check_level(target_level)?;
    let mut total: u64 = 0;
    for level in 1..target_level {
        total = total.saturating_add(xp_required_for_level(level)?);
    }
    Ok(total)
}

/// Highest level whose cumulative requirement is covered by `total_xp`.
pub fn level_from_total_xp(total_xp: i64) -> Result<u32> {
    check_total(total_xp)?;
    let total = total_xp as u64;

    let mut level: u32 = 1;
    let mut accumulated: u64 = 0;
    while level < u32::MAX {
        let next = accumulated.saturating_add(xp_required_for_level(level)?);
        if next > total {
            break;
        }
        accumulated = next;
        level += 1;
    }
    Ok(level)
}

/// XP earned inside `level`: `total_xp - cumulative_xp_for_level(level)`.
///
/// Negative when `total_xp` has not actually reached `level`.
pub fn current_level_xp(total_xp: i64, level: u32) -> Result<i64> {
    check_total(total_xp)?;
    let floor = cumulative_xp_for_level(level)?;
    let floor = i64::try_from(floor).unwrap_or(i64::MAX);
    Ok(total_xp.saturating_sub(floor))
}

/// Progress through `level` as a percentage in `[0, 100]`, rounded to two
/// decimals.
pub fn level_progress_percentage(total_xp: i64, level: u32) -> Result<f64> {
    let earned = current_level_xp(total_xp, level)?;
    let required = xp_required_for_level(level)?;
    if required == 0 {
        return Ok(100.0);
    }

    let percentage = earned as f64 / required as f64 * 100.0;
    let rounded = (percentage * 100.0).round() / 100.0;
    Ok(rounded.clamp(0.0, 100.0))
}

/// Tasks of `difficulty` still needed to finish `level`.
pub fn tasks_needed_to_level_up(total_xp: i64, level: u32, difficulty: Difficulty) -> Result<u64> {
    let required = i128::from(xp_required_for_level(level)?);
    let earned = i128::from(current_level_xp(total_xp, level)?);
    let per_task = i128::from(xp_for_difficulty(difficulty));

    let missing = required - earned;
    if missing <= 0 {
        return Ok(0);
    }
    let tasks = (missing + per_task - 1) / per_task;
    Ok(u64::try_from(tasks).unwrap_or(u64::MAX))
}

/// Level position derived from a lifetime XP total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelStanding {
    pub level: u32,
    pub current_xp: u64,
    pub xp_to_next_level: u64,
}

/// Level, in-level XP and next requirement for `total_xp`.
pub fn standing_for_total_xp(total_xp: i64) -> Result<LevelStanding> {
    let level = level_from_total_xp(total_xp)?;
    let current = current_level_xp(total_xp, level)?;
    Ok(LevelStanding {
        level,
        current_xp: u64::try_from(current).unwrap_or(0),
        xp_to_next_level: xp_required_for_level(level)?,
    })
}

/// One row of the level table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelRow {
    pub level: u32,
    pub xp_required: u64,
    pub cumulative_xp: u64,
}

/// Requirements for levels `1..=max_level`.
pub fn level_table(max_level: u32) -> Result<Vec<LevelRow>> {
    let mut rows = Vec::new();
    let mut cumulative = 0u64;
    for level in 1..=max_level {
        let xp_required = xp_required_for_level(level)?;
        rows.push(LevelRow {
            level,
            xp_required,
            cumulative_xp: cumulative,
        });
        cumulative = cumulative.saturating_add(xp_required);
    }
    Ok(rows)
}
