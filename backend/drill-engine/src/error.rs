use thiserror::Error;

use crate::models::AttemptState;

/// Errors returned by session-level operations.
///
/// None of these are retried internally; they go back to the caller as-is.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid transition: expected state {expected}, got {actual}")]
    InvalidTransition {
        expected: AttemptState,
        actual: AttemptState,
    },

    #[error("Unknown {kind} reference: {id}")]
    UnknownReference { kind: &'static str, id: String },

    #[error("Attempt already completed: {0}")]
    AlreadyCompleted(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Storage error: {0}")]
    Store(String),
}

impl EngineError {
    pub fn definition_not_found(id: &str) -> Self {
        EngineError::NotFound {
            kind: "Definition",
            id: id.to_string(),
        }
    }

    pub fn attempt_not_found(id: &str) -> Self {
        EngineError::NotFound {
            kind: "Attempt",
            id: id.to_string(),
        }
    }

    pub fn unknown_action(id: &str) -> Self {
        EngineError::UnknownReference {
            kind: "action",
            id: id.to_string(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// A single reason a definition was refused by the catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("Malformed definition: {0}")]
    Malformed(String),

    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("Field '{field}' is invalid: {message}")]
    EmptyField { field: String, message: String },

    #[error("Invalid category '{0}'. Must be one of beginner, intermediate, advanced")]
    InvalidCategory(String),

    #[error("Invalid medium '{0}'. Must be one of email, sms, website")]
    InvalidMedium(String),

    #[error("Definition must have at least one red flag")]
    NoRedFlags,

    #[error("Definition must have at least one action")]
    NoActions,

    #[error("Definition must have at least one correct action")]
    NoCorrectAction,

    #[error("Definition must have at least one incorrect action")]
    NoIncorrectAction,

    #[error("Duplicate id '{0}' within definition")]
    DuplicateId(String),

    #[error("Definition id '{0}' is already loaded")]
    DuplicateDefinition(String),
}

/// All violations found in one definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Definition failed validation with {} violation(s)", .violations.len())]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn contains(&self, violation: &Violation) -> bool {
        self.violations.contains(violation)
    }
}
