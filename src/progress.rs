//! Hero progression: level, XP, streak, outfits and the skill tree.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::events::{CompletionListener, TaskCompleted};
use crate::xp;

pub const DEFAULT_OUTFIT: &str = "default";
pub const DEFAULT_APPEARANCE: &str = "default";

/// The five fixed skill-tree branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillCategory {
    Productivity,
    Creativity,
    Health,
    Learning,
    Social,
}

impl SkillCategory {
    pub fn all() -> [SkillCategory; 5] {
        [
            SkillCategory::Productivity,
            SkillCategory::Creativity,
            SkillCategory::Health,
            SkillCategory::Learning,
            SkillCategory::Social,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SkillCategory::Productivity => "productivity",
            SkillCategory::Creativity => "creativity",
            SkillCategory::Health => "health",
            SkillCategory::Learning => "learning",
            SkillCategory::Social => "social",
        }
    }

    /// Skill branch for a free-form task category, ignoring case.
    pub fn from_task_category(category: &str) -> Option<Self> {
        category.parse().ok()
    }
}

impl fmt::Display for SkillCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillCategory {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        SkillCategory::all()
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "unknown skill category '{raw}' (expected productivity|creativity|health|learning|social)"
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillTree {
    #[serde(default)]
    pub productivity: u64,
    #[serde(default)]
    pub creativity: u64,
    #[serde(default)]
    pub health: u64,
    #[serde(default)]
    pub learning: u64,
    #[serde(default)]
    pub social: u64,
}

impl SkillTree {
    pub fn get(&self, category: SkillCategory) -> u64 {
        match category {
            SkillCategory::Productivity => self.productivity,
            SkillCategory::Creativity => self.creativity,
            SkillCategory::Health => self.health,
            SkillCategory::Learning => self.learning,
            SkillCategory::Social => self.social,
        }
    }

    fn slot(&mut self, category: SkillCategory) -> &mut u64 {
        match category {
            SkillCategory::Productivity => &mut self.productivity,
            SkillCategory::Creativity => &mut self.creativity,
            SkillCategory::Health => &mut self.health,
            SkillCategory::Learning => &mut self.learning,
            SkillCategory::Social => &mut self.social,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroCharacter {
    pub level: u32,
    pub appearance: String,
    /// Insertion-ordered set; never holds duplicates.
    pub unlocked_outfits: Vec<String>,
    pub current_outfit: String,
}

impl Default for HeroCharacter {
    fn default() -> Self {
        Self {
            level: 1,
            appearance: DEFAULT_APPEARANCE.to_string(),
            unlocked_outfits: vec![DEFAULT_OUTFIT.to_string()],
            current_outfit: DEFAULT_OUTFIT.to_string(),
        }
    }
}

impl HeroCharacter {
    pub fn has_outfit(&self, name: &str) -> bool {
        self.unlocked_outfits.iter().any(|o| o == name)
    }
}

fn requirement(level: u32) -> u64 {
    xp::xp_required_for_level(level.max(1)).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub level: u32,
    #[serde(rename = "currentXP")]
    pub current_xp: u64,
    #[serde(rename = "totalXP")]
    pub total_xp: u64,
    #[serde(rename = "xpToNextLevel")]
    pub xp_to_next_level: u64,
    #[serde(default)]
    pub completed_tasks_count: u64,
    #[serde(default)]
    pub streak: u64,
    #[serde(default)]
    pub hero_character: HeroCharacter,
    #[serde(default)]
    pub skill_tree: SkillTree,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            level: 1,
            current_xp: 0,
            total_xp: 0,
            xp_to_next_level: requirement(1),
            completed_tasks_count: 0,
            streak: 0,
            hero_character: HeroCharacter::default(),
            skill_tree: SkillTree::default(),
        }
    }
}

impl UserProgress {
    /// Progress through the current level, 0-100.
    pub fn level_percentage(&self) -> f64 {
        if self.xp_to_next_level == 0 {
            return 100.0;
        }
        let pct = self.current_xp as f64 / self.xp_to_next_level as f64 * 100.0;
        ((pct * 100.0).round() / 100.0).clamp(0.0, 100.0)
    }

    /// Repair derived fields after loading from storage.
    fn normalize(&mut self) {
        self.level = self.level.max(1);
        self.xp_to_next_level = requirement(self.level);
        self.settle();
        self.hero_character.level = self.level;
        if !self.hero_character.has_outfit(DEFAULT_OUTFIT) {
            self.hero_character
                .unlocked_outfits
                .insert(0, DEFAULT_OUTFIT.to_string());
        }
        let mut seen = std::collections::HashSet::new();
        self.hero_character
            .unlocked_outfits
            .retain(|o| seen.insert(o.clone()));
        if !self.hero_character.has_outfit(&self.hero_character.current_outfit) {
            self.hero_character.current_outfit = DEFAULT_OUTFIT.to_string();
        }
    }

    /// Roll `current_xp` over into level-ups until it is below the
    /// requirement.
    fn settle(&mut self) {
        while self.current_xp >= self.xp_to_next_level {
            self.current_xp -= self.xp_to_next_level;
            self.level = self.level.saturating_add(1);
            self.xp_to_next_level = requirement(self.level);
        }
    }
}

/// Persisted `{progress}` record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub progress: UserProgress,
}

/// Level change produced by one XP grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelChange {
    pub from: u32,
    pub to: u32,
}

impl LevelChange {
    pub fn levels_gained(&self) -> u32 {
        self.to - self.from
    }
}

/// Owner of [`UserProgress`].
///
/// Every mutation builds the full next state before replacing the current
/// one. Level-ups reached through completions are queued and can be drained
/// with [`ProgressStore::take_level_ups`].
#[derive(Debug, Clone, Default)]
pub struct ProgressStore {
    progress: UserProgress,
    level_ups: Vec<LevelChange>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_record(record: ProgressRecord) -> Self {
        let mut progress = record.progress;
        progress.normalize();
        Self {
            progress,
            level_ups: Vec::new(),
        }
    }

    pub fn record(&self) -> ProgressRecord {
        ProgressRecord {
            progress: self.progress.clone(),
        }
    }

    pub fn progress(&self) -> &UserProgress {
        &self.progress
    }

    /// Grant `amount` XP, levelling up as many times as it covers.
    ///
    /// Returns the level change when at least one level was gained.
    pub fn add_xp(&mut self, amount: u64, skill: Option<SkillCategory>) -> Option<LevelChange> {
        let mut next = self.progress.clone();
        let from = next.level;

        next.total_xp = next.total_xp.saturating_add(amount);
        next.current_xp = next.current_xp.saturating_add(amount);
        next.settle();
        next.hero_character.level = next.level;

        if let Some(category) = skill {
            let slot = next.skill_tree.slot(category);
            *slot = slot.saturating_add(amount);
        }

        let change = (next.level > from).then_some(LevelChange {
            from,
            to: next.level,
        });
        self.progress = next;

        if let Some(change) = change {
            info!(from = change.from, to = change.to, "level up");
            self.level_ups.push(change);
        }
        change
    }

    /// Credit a completed task: XP, matching skill branch and the
    /// completion counter.
    pub fn complete_task(&mut self, xp_value: u32, category: Option<&str>) -> Option<LevelChange> {
        let skill = category.and_then(SkillCategory::from_task_category);
        let change = self.add_xp(u64::from(xp_value), skill);
        self.progress.completed_tasks_count = self.progress.completed_tasks_count.saturating_add(1);
        debug!(
            xp = xp_value,
            completed = self.progress.completed_tasks_count,
            "task credited"
        );
        change
    }

    pub fn increment_streak(&mut self) {
        self.progress.streak = self.progress.streak.saturating_add(1);
    }

    pub fn reset_streak(&mut self) {
        self.progress.streak = 0;
    }

    /// Add `name` to the unlocked outfits. Returns `false` if it was already
    /// there.
    pub fn unlock_outfit(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.progress.hero_character.has_outfit(name) {
            return false;
        }
        self.progress
            .hero_character
            .unlocked_outfits
            .push(name.to_string());
        true
    }

    /// Wear `name`. Locked outfits leave the state unchanged and return
    /// `false`.
    pub fn set_current_outfit(&mut self, name: &str) -> bool {
        let name = name.trim();
        if !self.progress.hero_character.has_outfit(name) {
            return false;
        }
        self.progress.hero_character.current_outfit = name.to_string();
        true
    }

    /// Add `delta` to one skill branch, never going below zero.
    pub fn update_skill(&mut self, category: SkillCategory, delta: i64) {
        let slot = self.progress.skill_tree.slot(category);
        *slot = if delta >= 0 {
            slot.saturating_add(delta.unsigned_abs())
        } else {
            slot.saturating_sub(delta.unsigned_abs())
        };
    }

    /// Drain level changes recorded since the last call.
    pub fn take_level_ups(&mut self) -> Vec<LevelChange> {
        std::mem::take(&mut self.level_ups)
    }

    pub fn reset(&mut self) {
        self.progress = UserProgress::default();
        self.level_ups.clear();
    }
}

impl CompletionListener for ProgressStore {
    fn on_task_completed(&mut self, event: &TaskCompleted) {
        self.complete_task(event.xp_value, event.category.as_deref());
        self.increment_streak();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_start_at_level_one() {
        let progress = UserProgress::default();
        assert_eq!(progress.level, 1);
        assert_eq!(progress.xp_to_next_level, 100);
        assert_eq!(progress.hero_character.current_outfit, "default");
        assert_eq!(progress.skill_tree, SkillTree::default());
    }

    #[test]
    fn single_grant_crosses_two_levels() {
        let mut store = ProgressStore::new();
        let change = store.add_xp(260, None).unwrap();
        assert_eq!(change, LevelChange { from: 1, to: 3 });
        assert_eq!(change.levels_gained(), 2);

        let p = store.progress();
        assert_eq!(p.level, 3);
        assert_eq!(p.current_xp, 10);
        assert_eq!(p.total_xp, 260);
        assert_eq!(p.xp_to_next_level, 225);
        assert_eq!(p.hero_character.level, 3);
    }

    #[test]
    fn exact_threshold_levels_up_with_zero_remainder() {
        let mut store = ProgressStore::new();
        assert!(store.add_xp(99, None).is_none());
        assert_eq!(store.add_xp(1, None), Some(LevelChange { from: 1, to: 2 }));
        assert_eq!(store.progress().current_xp, 0);
        assert_eq!(store.take_level_ups().len(), 1);
        assert!(store.take_level_ups().is_empty());
    }

    #[test]
    fn state_agrees_with_calculator() {
        let mut store = ProgressStore::new();
        for amount in [10, 25, 50, 300, 7, 1000, 50] {
            store.add_xp(amount, None);
            let p = store.progress();
            let standing = xp::standing_for_total_xp(p.total_xp as i64).unwrap();
            assert_eq!(p.level, standing.level);
            assert_eq!(p.current_xp, standing.current_xp);
            assert!(p.current_xp < p.xp_to_next_level);
        }
    }

    #[test]
    fn completion_maps_category_case_insensitively() {
        let mut store = ProgressStore::new();
        store.complete_task(25, Some("HEALTH"));
        store.complete_task(10, Some("Chores"));
        store.complete_task(50, None);

        let p = store.progress();
        assert_eq!(p.skill_tree.health, 25);
        assert_eq!(p.skill_tree.get(SkillCategory::Productivity), 0);
        assert_eq!(p.completed_tasks_count, 3);
        assert_eq!(p.total_xp, 85);
    }

    #[test]
    fn listener_credits_xp_count_and_streak() {
        let mut store = ProgressStore::new();
        store.on_task_completed(&TaskCompleted {
            task_id: "t".to_string(),
            xp_value: 50,
            category: Some("learning".to_string()),
        });
        let p = store.progress();
        assert_eq!(p.total_xp, 50);
        assert_eq!(p.completed_tasks_count, 1);
        assert_eq!(p.streak, 1);
        assert_eq!(p.skill_tree.learning, 50);
    }

    #[test]
    fn streak_counter() {
        let mut store = ProgressStore::new();
        store.increment_streak();
        store.increment_streak();
        assert_eq!(store.progress().streak, 2);
        store.reset_streak();
        assert_eq!(store.progress().streak, 0);
    }

    #[test]
    fn outfits_unlock_idempotently_and_locked_ones_are_ignored() {
        let mut store = ProgressStore::new();
        assert!(!store.set_current_outfit("cape"));
        assert_eq!(store.progress().hero_character.current_outfit, "default");

        assert!(store.unlock_outfit("cape"));
        assert!(!store.unlock_outfit("cape"));
        assert_eq!(store.progress().hero_character.unlocked_outfits.len(), 2);

        assert!(store.set_current_outfit("cape"));
        assert_eq!(store.progress().hero_character.current_outfit, "cape");
    }

    #[test]
    fn outfit_names_are_trimmed_on_both_sides() {
        let mut store = ProgressStore::new();
        assert!(store.unlock_outfit(" cape "));
        assert!(store.set_current_outfit(" cape "));
        assert_eq!(store.progress().hero_character.current_outfit, "cape");
    }

    #[test]
    fn skill_updates_floor_at_zero() {
        let mut store = ProgressStore::new();
        store.update_skill(SkillCategory::Social, 5);
        store.update_skill(SkillCategory::Social, -20);
        assert_eq!(store.progress().skill_tree.social, 0);
        store.update_skill(SkillCategory::Social, 3);
        assert_eq!(store.progress().skill_tree.social, 3);
    }

    #[test]
    fn loaded_records_are_normalized() {
        let record: ProgressRecord = serde_json::from_value(serde_json::json!({
            "progress": {
                "level": 0,
                "currentXP": 130,
                "totalXP": 130,
                "xpToNextLevel": 5,
                "heroCharacter": {
                    "level": 9,
                    "appearance": "default",
                    "unlockedOutfits": ["cape", "cape"],
                    "currentOutfit": "armor"
                }
            }
        }))
        .unwrap();

        let store = ProgressStore::from_record(record);
        let p = store.progress();
        assert_eq!(p.level, 2);
        assert_eq!(p.current_xp, 30);
        assert_eq!(p.xp_to_next_level, 150);
        assert_eq!(p.hero_character.level, 2);
        assert_eq!(p.hero_character.unlocked_outfits, vec!["default", "cape"]);
        assert_eq!(p.hero_character.current_outfit, "default");
    }

    #[test]
    fn record_field_names() {
        let json = serde_json::to_value(ProgressStore::new().record()).unwrap();
        let p = &json["progress"];
        assert_eq!(p["currentXP"], 0);
        assert_eq!(p["totalXP"], 0);
        assert_eq!(p["xpToNextLevel"], 100);
        assert_eq!(p["completedTasksCount"], 0);
        assert_eq!(p["heroCharacter"]["unlockedOutfits"][0], "default");
        assert_eq!(p["skillTree"]["productivity"], 0);
    }

    #[test]
    fn skill_category_parse() {
        assert_eq!(" Social ".parse::<SkillCategory>().unwrap(), SkillCategory::Social);
        assert!(SkillCategory::from_task_category("work").is_none());
    }
}
