pub mod attempt;
pub mod definition;
pub mod notification;
pub mod report;

pub use attempt::{ActionOutcome, Attempt, AttemptEvent, AttemptState, EventKind};
pub use definition::{
    ActionOption, Category, DefinitionSummary, ExerciseDefinition, Medium, RawActionOption,
    RawDefinition, RawRedFlag, RedFlag,
};
pub use notification::{
    ActionFeedback, AttemptNotification, FlagsRecorded, ReportReady, StageAdvanced,
};
pub use report::{FeedbackSummary, Report, ScoreBreakdown, Tier};
