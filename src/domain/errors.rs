//! Domain errors for the quality loop.

use thiserror::Error;

use super::models::LoopVerdict;

/// Domain-level errors that can occur in the quality loop.
///
/// Validation variants mean the caller must correct the call; storage variants
/// surface persistence failures. Nothing here is retried automatically.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Score {score} for dimension '{dimension}' is out of range (must be 0-10)")]
    ScoreOutOfRange { dimension: String, score: f64 },

    #[error("Unknown check event type: {0} (expected trigger, pass, fix or false_positive)")]
    UnknownEventType(String),

    #[error("Invalid check id: {0:?}")]
    InvalidCheckId(String),

    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),

    #[error("Round {0} is already in progress; complete it before starting another")]
    RoundAlreadyActive(u32),

    #[error("No round is in progress")]
    NoActiveRound,

    #[error("Review loop already finished with verdict {0}")]
    LoopTerminated(LoopVerdict),

    #[error("Issue {index} of round {round} does not exist")]
    UnknownIssue { round: u32, index: usize },

    #[error("Issue {index} of round {round} already has a fix")]
    IssueAlreadyFixed { round: u32, index: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corrupt {kind} record: {reason}")]
    CorruptRecord { kind: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Storage(err.to_string())
    }
}
