use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Stage of an attempt. Stages advance strictly in declaration order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Created,
    Briefed,
    Presented,
    ActionChosen,
    FlagsSubmitted,
    Scored,
    Completed,
}

impl AttemptState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptState::Created => "created",
            AttemptState::Briefed => "briefed",
            AttemptState::Presented => "presented",
            AttemptState::ActionChosen => "action_chosen",
            AttemptState::FlagsSubmitted => "flags_submitted",
            AttemptState::Scored => "scored",
            AttemptState::Completed => "completed",
        }
    }

    /// The only state this one may advance to.
    pub fn next(&self) -> Option<AttemptState> {
        match self {
            AttemptState::Created => Some(AttemptState::Briefed),
            AttemptState::Briefed => Some(AttemptState::Presented),
            AttemptState::Presented => Some(AttemptState::ActionChosen),
            AttemptState::ActionChosen => Some(AttemptState::FlagsSubmitted),
            AttemptState::FlagsSubmitted => Some(AttemptState::Scored),
            AttemptState::Scored => Some(AttemptState::Completed),
            AttemptState::Completed => None,
        }
    }

    pub fn can_transition_to(&self, next: AttemptState) -> bool {
        self.next() == Some(next)
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, AttemptState::Scored | AttemptState::Completed)
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user's run through one definition. Timestamps are epoch seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attempt {
    pub id: String,
    pub definition_id: String,
    pub owner_id: String,
    pub state: AttemptState,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub chosen_action_id: Option<String>,
    pub chosen_flag_ids: BTreeSet<String>,
    pub score_percentage: Option<f64>,
}

/// Payload of a recorded event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    StageAdvanced {
        from: Option<AttemptState>,
        to: AttemptState,
    },
    ActionChosen {
        action_id: String,
        correct: bool,
    },
    FlagsSubmitted {
        flag_ids: BTreeSet<String>,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::StageAdvanced { .. } => "stage_advanced",
            EventKind::ActionChosen { .. } => "action_chosen",
            EventKind::FlagsSubmitted { .. } => "flags_submitted",
        }
    }
}

/// Append-only audit record. `sequence` orders events within an attempt;
/// `recorded_at` is informational only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttemptEvent {
    pub attempt_id: String,
    pub sequence: u64,
    pub recorded_at: i64,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Immediate result of choosing an action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionOutcome {
    pub action_id: String,
    pub correct: bool,
    pub feedback: String,
}
