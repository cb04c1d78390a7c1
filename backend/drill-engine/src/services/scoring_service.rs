use std::collections::BTreeSet;

use crate::error::{EngineError, EngineResult};
use crate::models::{ExerciseDefinition, ScoreBreakdown};

// Points awarded for each component
pub const POINTS_CORRECT_ACTION: i64 = 50;
pub const POINTS_PER_RED_FLAG: i64 = 10;
pub const TIME_BONUS_THRESHOLD_SECONDS: u64 = 60;
pub const TIME_BONUS_POINTS: i64 = 15;
pub const TIME_PENALTY_THRESHOLD_SECONDS: u64 = 300;
pub const TIME_PENALTY_POINTS: i64 = 10;

/// Bonus or penalty for how long the attempt took, with its label.
pub fn time_adjustment(elapsed_seconds: u64) -> (i64, &'static str) {
    if elapsed_seconds <= TIME_BONUS_THRESHOLD_SECONDS {
        (TIME_BONUS_POINTS, "Quick response bonus")
    } else if elapsed_seconds >= TIME_PENALTY_THRESHOLD_SECONDS {
        (-TIME_PENALTY_POINTS, "Slow response penalty")
    } else {
        (0, "Normal response time")
    }
}

/// Scores one attempt. Pure: the same inputs always give the same breakdown.
///
/// `chosen_flag_ids` is intersected with the definition's red flags again
/// here, so unknown ids never earn points even if the caller did not filter.
pub fn score(
    definition: &ExerciseDefinition,
    chosen_action_id: &str,
    chosen_flag_ids: &BTreeSet<String>,
    elapsed_seconds: u64,
) -> EngineResult<ScoreBreakdown> {
    let action = definition
        .action(chosen_action_id)
        .ok_or_else(|| EngineError::unknown_action(chosen_action_id))?;

    let action_points = if action.correct {
        POINTS_CORRECT_ACTION
    } else {
        0
    };

    let flags_total = definition.red_flags.len();
    let flags_identified = definition
        .red_flags
        .iter()
        .filter(|flag| chosen_flag_ids.contains(&flag.id))
        .count();
    let flag_points = POINTS_PER_RED_FLAG * flags_identified as i64;
    let flag_max = POINTS_PER_RED_FLAG * flags_total as i64;

    let (time_bonus, time_label) = time_adjustment(elapsed_seconds);

    let max_possible = POINTS_CORRECT_ACTION + flag_max + TIME_BONUS_POINTS;
    let raw_total = action_points + flag_points + time_bonus;
    let total = raw_total.clamp(0, max_possible);
    let percentage = 100.0 * total as f64 / max_possible as f64;

    Ok(ScoreBreakdown {
        action_points,
        action_max: POINTS_CORRECT_ACTION,
        flag_points,
        flag_max,
        time_bonus,
        time_max: TIME_BONUS_POINTS,
        time_label: time_label.to_string(),
        raw_total,
        total,
        max_possible,
        percentage,
        flags_identified,
        flags_total,
    })
}
