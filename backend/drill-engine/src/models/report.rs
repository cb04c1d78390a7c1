use serde::{Deserialize, Serialize};

use super::definition::RedFlag;

/// Scored result of one attempt. Derived entirely from its inputs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub action_points: i64,
    pub action_max: i64,
    pub flag_points: i64,
    pub flag_max: i64,
    pub time_bonus: i64,
    pub time_max: i64,
    pub time_label: String,
    pub raw_total: i64,
    pub total: i64,
    pub max_possible: i64,
    pub percentage: f64,
    pub flags_identified: usize,
    pub flags_total: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Excellent,
    Good,
    Moderate,
    NeedsReview,
}

impl Tier {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            Tier::Excellent
        } else if percentage >= 70.0 {
            Tier::Good
        } else if percentage >= 50.0 {
            Tier::Moderate
        } else {
            Tier::NeedsReview
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Excellent => "excellent",
            Tier::Good => "good",
            Tier::Moderate => "moderate",
            Tier::NeedsReview => "needs_review",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Tier::Excellent => {
                "Excellent performance! You demonstrated strong phishing awareness."
            }
            Tier::Good => "Good job! You caught most of the warning signs.",
            Tier::Moderate => {
                "Moderate performance. There's room for improvement in identifying phishing indicators."
            }
            Tier::NeedsReview => {
                "This was a challenging scenario. Review the red flags below to strengthen your defenses."
            }
        }
    }
}

/// Post-attempt explanation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackSummary {
    pub tier: Tier,
    pub action_correct: bool,
    pub action_feedback: String,
    pub flags_identified: usize,
    pub flags_total: usize,
    pub missed_flags: Vec<RedFlag>,
    pub text: String,
}

/// Outcome artifact of a completed attempt. Fields are read-only once built.
///
/// Serializable for external renderers; not deserializable, so the only way
/// to obtain one is through the report assembler or a `ReportStore`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Report {
    id: String,
    attempt_id: String,
    definition_id: String,
    owner_id: String,
    breakdown: ScoreBreakdown,
    tier: Tier,
    elapsed_seconds: u64,
    flags_identified: usize,
    flags_total: usize,
    missed_flags: Vec<RedFlag>,
    feedback: String,
    created_at: i64,
}

impl Report {
    /// Only the report assembler builds reports.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: String,
        attempt_id: String,
        definition_id: String,
        owner_id: String,
        breakdown: ScoreBreakdown,
        feedback: FeedbackSummary,
        elapsed_seconds: u64,
        created_at: i64,
    ) -> Self {
        Self {
            id,
            attempt_id,
            definition_id,
            owner_id,
            tier: feedback.tier,
            flags_identified: feedback.flags_identified,
            flags_total: feedback.flags_total,
            missed_flags: feedback.missed_flags,
            feedback: feedback.text,
            breakdown,
            elapsed_seconds,
            created_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    pub fn definition_id(&self) -> &str {
        &self.definition_id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn breakdown(&self) -> &ScoreBreakdown {
        &self.breakdown
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn flags_identified(&self) -> usize {
        self.flags_identified
    }

    pub fn flags_total(&self) -> usize {
        self.flags_total
    }

    pub fn missed_flags(&self) -> &[RedFlag] {
        &self.missed_flags
    }

    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }
}
