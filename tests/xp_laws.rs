use heropath::error::Error;
use heropath::task::Difficulty;
use heropath::xp::{
    cumulative_xp_for_level, current_level_xp, level_from_total_xp, level_progress_percentage,
    standing_for_total_xp, tasks_needed_to_level_up, xp_for_difficulty, xp_for_difficulty_name,
    xp_required_for_level,
};

#[test]
fn difficulty_rewards() {
    assert_eq!(xp_for_difficulty(Difficulty::Easy), 10);
    assert_eq!(xp_for_difficulty(Difficulty::Medium), 25);
    assert_eq!(xp_for_difficulty(Difficulty::Hard), 50);
    assert_eq!(xp_for_difficulty_name("HARD").expect("hard"), 50);
    assert!(matches!(
        xp_for_difficulty_name("legendary"),
        Err(Error::InvalidDifficulty(_))
    ));
}

#[test]
fn curve_starts_at_one_hundred_and_grows() {
    assert_eq!(xp_required_for_level(1).unwrap(), 100);
    assert_eq!(xp_required_for_level(2).unwrap(), 150);
    assert_eq!(xp_required_for_level(3).unwrap(), 225);
    assert_eq!(xp_required_for_level(5).unwrap(), 506);
    assert_eq!(xp_required_for_level(10).unwrap(), 3844);
    assert_eq!(cumulative_xp_for_level(1).unwrap(), 0);
    assert_eq!(cumulative_xp_for_level(3).unwrap(), 250);

    for level in 1..40 {
        let here = xp_required_for_level(level).unwrap();
        let next = xp_required_for_level(level + 1).unwrap();
        assert!(next > here, "level {level} -> {}", level + 1);
    }
}

#[test]
fn cumulative_follows_recurrence() {
    for level in 1..40 {
        let here = cumulative_xp_for_level(level).unwrap();
        let next = cumulative_xp_for_level(level + 1).unwrap();
        assert_eq!(next, here + xp_required_for_level(level).unwrap());
    }
}

#[test]
fn level_round_trips_through_cumulative_floor() {
    for level in 1..30 {
        let floor = cumulative_xp_for_level(level).unwrap() as i64;
        assert_eq!(level_from_total_xp(floor).unwrap(), level);
        if floor > 0 {
            assert_eq!(level_from_total_xp(floor - 1).unwrap(), level - 1);
        }
    }
}

#[test]
fn in_level_xp_stays_below_requirement() {
    for total in (0..50_000).step_by(13) {
        let level = level_from_total_xp(total).unwrap();
        let earned = current_level_xp(total, level).unwrap();
        let required = xp_required_for_level(level).unwrap() as i64;
        assert!((0..required).contains(&earned), "{total}: {earned}/{required}");
    }
}

#[test]
fn level_is_monotonic_in_total_xp() {
    let mut previous = 1;
    for total in (0..20_000).step_by(37) {
        let level = level_from_total_xp(total).unwrap();
        assert!(level >= previous);
        previous = level;
    }
}

#[test]
fn mid_level_position() {
    assert_eq!(level_from_total_xp(260).unwrap(), 3);
    assert_eq!(current_level_xp(260, 3).unwrap(), 10);
    assert_eq!(level_progress_percentage(260, 3).unwrap(), 4.44);

    let standing = standing_for_total_xp(260).unwrap();
    assert_eq!(standing.level, 3);
    assert_eq!(standing.current_xp, 10);
    assert_eq!(standing.xp_to_next_level, 225);
}

#[test]
fn percentage_is_clamped() {
    for total in [0, 50, 99, 100, 249, 250, 10_000] {
        let level = level_from_total_xp(total).unwrap();
        let pct = level_progress_percentage(total, level).unwrap();
        assert!((0.0..=100.0).contains(&pct), "{total}: {pct}");
    }
    // Asking about a level the total never reached stays at zero.
    assert_eq!(level_progress_percentage(10, 5).unwrap(), 0.0);
}

#[test]
fn tasks_needed_rounds_up() {
    assert_eq!(tasks_needed_to_level_up(0, 1, Difficulty::Easy).unwrap(), 10);
    assert_eq!(tasks_needed_to_level_up(0, 1, Difficulty::Medium).unwrap(), 4);
    assert_eq!(tasks_needed_to_level_up(0, 1, Difficulty::Hard).unwrap(), 2);
    assert_eq!(tasks_needed_to_level_up(260, 3, Difficulty::Hard).unwrap(), 5);
    assert_eq!(tasks_needed_to_level_up(95, 1, Difficulty::Hard).unwrap(), 1);
}

#[test]
fn invalid_inputs_are_rejected() {
    assert!(matches!(xp_required_for_level(0), Err(Error::InvalidLevel(0))));
    assert!(matches!(level_from_total_xp(-1), Err(Error::NegativeXp(-1))));
    assert!(matches!(current_level_xp(-5, 1), Err(Error::NegativeXp(-5))));
}
