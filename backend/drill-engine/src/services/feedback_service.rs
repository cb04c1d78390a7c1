use std::collections::BTreeSet;

use crate::error::{EngineError, EngineResult};
use crate::models::{ExerciseDefinition, FeedbackSummary, RedFlag, ScoreBreakdown, Tier};

/// Builds the post-attempt explanation from a computed score.
pub fn compose(
    definition: &ExerciseDefinition,
    breakdown: &ScoreBreakdown,
    chosen_action_id: &str,
    chosen_flag_ids: &BTreeSet<String>,
) -> EngineResult<FeedbackSummary> {
    let action = definition
        .action(chosen_action_id)
        .ok_or_else(|| EngineError::unknown_action(chosen_action_id))?;

    let tier = Tier::from_percentage(breakdown.percentage);
    let missed_flags: Vec<RedFlag> = definition
        .red_flags
        .iter()
        .filter(|flag| !chosen_flag_ids.contains(&flag.id))
        .cloned()
        .collect();
    let flags_total = definition.red_flags.len();
    let flags_identified = flags_total - missed_flags.len();

    let mut lines = vec![tier.message().to_string()];

    if action.correct {
        lines.push(format!("You chose the correct action: {}", action.feedback));
    } else {
        lines.push(format!("Your action was risky. {}", action.feedback));
    }

    lines.push(format!(
        "You identified {} out of {} red flags.",
        flags_identified, flags_total
    ));

    if !missed_flags.is_empty() {
        lines.push("Missed red flags:".to_string());
        for flag in &missed_flags {
            lines.push(format!("  - {}: {}", flag.label, flag.detail));
        }
    }

    Ok(FeedbackSummary {
        tier,
        action_correct: action.correct,
        action_feedback: action.feedback.clone(),
        flags_identified,
        flags_total,
        missed_flags,
        text: lines.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionOption, Category, Medium};
    use crate::services::scoring_service::score;

    fn definition() -> ExerciseDefinition {
        ExerciseDefinition {
            id: "sms".to_string(),
            title: "Parcel delivery".to_string(),
            category: Category::Intermediate,
            medium: Medium::Sms,
            description: "desc".to_string(),
            context: "ctx".to_string(),
            content: serde_json::json!({ "sender": "+1555" }),
            red_flags: vec![
                RedFlag {
                    id: "link".to_string(),
                    label: "Shortened link".to_string(),
                    detail: "Hides the real destination".to_string(),
                },
                RedFlag {
                    id: "fee".to_string(),
                    label: "Unexpected fee".to_string(),
                    detail: "Couriers rarely ask for fees by SMS".to_string(),
                },
                RedFlag {
                    id: "number".to_string(),
                    label: "Unknown number".to_string(),
                    detail: "Not the courier's short code".to_string(),
                },
            ],
            actions: vec![
                ActionOption {
                    id: "delete_report".to_string(),
                    label: "Delete and report".to_string(),
                    correct: true,
                    feedback: "Reporting helps protect others.".to_string(),
                },
                ActionOption {
                    id: "pay".to_string(),
                    label: "Pay the fee".to_string(),
                    correct: false,
                    feedback: "The payment page harvests card details.".to_string(),
                },
            ],
            learning_notes: vec![],
        }
    }

    #[test]
    fn needs_review_lists_every_missed_flag() {
        let def = definition();
        let none = BTreeSet::new();
        let breakdown = score(&def, "delete_report", &none, 400).unwrap();
        let summary = compose(&def, &breakdown, "delete_report", &none).unwrap();

        assert_eq!(summary.tier, Tier::NeedsReview);
        assert_eq!(summary.flags_identified, 0);
        assert_eq!(summary.missed_flags.len(), 3);
        assert!(summary
            .text
            .contains("You chose the correct action: Reporting helps protect others."));
        assert!(summary.text.contains("You identified 0 out of 3 red flags."));
        assert!(summary
            .text
            .contains("  - Shortened link: Hides the real destination"));
    }

    #[test]
    fn risky_action_and_full_flags_omit_missed_section() {
        let def = definition();
        let all: BTreeSet<String> = def.red_flags.iter().map(|f| f.id.clone()).collect();
        let breakdown = score(&def, "pay", &all, 30).unwrap();
        let summary = compose(&def, &breakdown, "pay", &all).unwrap();

        assert!(!summary.action_correct);
        assert!(summary.text.contains("Your action was risky."));
        assert!(summary.missed_flags.is_empty());
        assert!(!summary.text.contains("Missed red flags:"));
    }

    #[test]
    fn first_line_is_the_tier_message() {
        let def = definition();
        let all: BTreeSet<String> = def.red_flags.iter().map(|f| f.id.clone()).collect();
        let breakdown = score(&def, "delete_report", &all, 30).unwrap();
        let summary = compose(&def, &breakdown, "delete_report", &all).unwrap();

        assert_eq!(summary.tier, Tier::Excellent);
        assert_eq!(summary.text.lines().next(), Some(Tier::Excellent.message()));
    }

    fn four_flag_definition() -> ExerciseDefinition {
        let mut def = definition();
        def.red_flags.push(RedFlag {
            id: "greeting".to_string(),
            label: "Generic greeting".to_string(),
            detail: "Your courier knows your name".to_string(),
        });
        def
    }

    #[test]
    fn three_of_four_flags_fast_is_excellent() {
        let def = four_flag_definition();
        let chosen: BTreeSet<String> = ["link", "fee", "number"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let breakdown = score(&def, "delete_report", &chosen, 45).unwrap();
        let summary = compose(&def, &breakdown, "delete_report", &chosen).unwrap();

        assert_eq!(breakdown.total, 95);
        assert_eq!(breakdown.max_possible, 105);
        assert!((breakdown.percentage - 90.48).abs() < 0.01);
        assert_eq!(summary.tier, Tier::Excellent);
        assert_eq!(summary.missed_flags.len(), 1);
        assert_eq!(summary.missed_flags[0].id, "greeting");
    }

    #[test]
    fn correct_action_without_flags_slow_needs_review() {
        let def = definition();
        let none = BTreeSet::new();
        let breakdown = score(&def, "delete_report", &none, 400).unwrap();
        let summary = compose(&def, &breakdown, "delete_report", &none).unwrap();

        assert_eq!(breakdown.total, 40);
        assert!((breakdown.percentage - 42.1).abs() < 0.01);
        assert_eq!(summary.tier, Tier::NeedsReview);
    }
}
