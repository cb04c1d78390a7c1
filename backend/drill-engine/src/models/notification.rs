use serde::{Deserialize, Serialize};

use super::attempt::AttemptState;
use super::report::Tier;

/// Push notifications emitted while an attempt progresses.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AttemptNotification {
    StageAdvanced(StageAdvanced),
    ActionFeedback(ActionFeedback),
    FlagsRecorded(FlagsRecorded),
    ReportReady(ReportReady),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StageAdvanced {
    pub attempt_id: String,
    pub stage: AttemptState,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ActionFeedback {
    pub attempt_id: String,
    pub action_id: String,
    pub correct: bool,
    pub feedback: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FlagsRecorded {
    pub attempt_id: String,
    pub accepted: usize,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReportReady {
    pub attempt_id: String,
    pub report_id: String,
    pub percentage: f64,
    pub tier: Tier,
}

impl AttemptNotification {
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            AttemptNotification::StageAdvanced(_) => "stage-advanced",
            AttemptNotification::ActionFeedback(_) => "action-feedback",
            AttemptNotification::FlagsRecorded(_) => "flags-recorded",
            AttemptNotification::ReportReady(_) => "report-ready",
        }
    }

    pub fn attempt_id(&self) -> &str {
        match self {
            AttemptNotification::StageAdvanced(n) => &n.attempt_id,
            AttemptNotification::ActionFeedback(n) => &n.attempt_id,
            AttemptNotification::FlagsRecorded(n) => &n.attempt_id,
            AttemptNotification::ReportReady(n) => &n.attempt_id,
        }
    }
}
