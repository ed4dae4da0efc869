//! Domain-level error taxonomy for Judgeflow.
//!
//! Every error carries a stable machine-readable [`ErrorKind`] and a
//! human-readable reason (its `Display`). Callers that need to report a
//! failure across a process boundary use [`ErrorReport`].

use std::fmt;

use judgeflow_state::{AssignmentId, IdeaId, JudgeId, RatingsError, StorageError};
use serde::{Deserialize, Serialize};

/// What a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Idea,
    Judge,
    Assignment,
    File,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::Idea => "idea",
            Entity::Judge => "judge",
            Entity::Assignment => "assignment",
            Entity::File => "file",
        })
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Judgeflow domain errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReviewError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error("judge already assigned to idea {idea_id}: {}", join(.judge_ids))]
    DuplicateAssignment {
        idea_id: IdeaId,
        judge_ids: Vec<JudgeId>,
    },

    #[error(
        "idea {idea_id} allows {max_judges} judges: {current} assigned, {requested} more requested"
    )]
    CapacityExceeded {
        idea_id: IdeaId,
        max_judges: u32,
        current: usize,
        requested: usize,
    },

    #[error("assignment {assignment_id} is locked")]
    Locked { assignment_id: AssignmentId },

    #[error("invalid ratings: {0}")]
    InvalidRatings(#[from] RatingsError),

    #[error("invalid decision {value:?}: expected APPROVED or REJECTED")]
    InvalidDecision { value: String },

    #[error("no valid session")]
    Unauthenticated,

    #[error("not permitted: {reason}")]
    Unauthorized { reason: String },

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ReviewError {
    pub fn not_found(entity: Entity, id: impl fmt::Display) -> Self {
        ReviewError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        ReviewError::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Stable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReviewError::NotFound { .. } => ErrorKind::NotFound,
            ReviewError::DuplicateAssignment { .. } => ErrorKind::DuplicateAssignment,
            ReviewError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            ReviewError::Locked { .. } => ErrorKind::Locked,
            ReviewError::InvalidRatings(_) => ErrorKind::InvalidRatings,
            ReviewError::InvalidDecision { .. } => ErrorKind::InvalidDecision,
            ReviewError::Unauthenticated => ErrorKind::Unauthenticated,
            ReviewError::Unauthorized { .. } => ErrorKind::Unauthorized,
            ReviewError::Storage(_) => ErrorKind::Storage,
            ReviewError::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether repeating the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ReviewError::Storage(e) if e.is_transient())
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            reason: self.to_string(),
        }
    }
}

impl From<StorageError> for ReviewError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::IdeaNotFound { idea_id } => ReviewError::not_found(Entity::Idea, idea_id),
            StorageError::JudgeNotFound { judge_ids } => {
                ReviewError::not_found(Entity::Judge, join(&judge_ids))
            }
            StorageError::AssignmentNotFound { assignment_id } => {
                ReviewError::not_found(Entity::Assignment, assignment_id)
            }
            StorageError::DuplicateAssignment { idea_id, judge_ids } => {
                ReviewError::DuplicateAssignment { idea_id, judge_ids }
            }
            StorageError::CapacityExceeded {
                idea_id,
                max_judges,
                current,
                requested,
            } => ReviewError::CapacityExceeded {
                idea_id,
                max_judges,
                current,
                requested,
            },
            StorageError::Locked { assignment_id } => ReviewError::Locked { assignment_id },
            other => ReviewError::Storage(other),
        }
    }
}

/// Stable machine-readable error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    DuplicateAssignment,
    CapacityExceeded,
    Locked,
    InvalidRatings,
    InvalidDecision,
    Unauthenticated,
    Unauthorized,
    Storage,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::DuplicateAssignment => "duplicate_assignment",
            ErrorKind::CapacityExceeded => "capacity_exceeded",
            ErrorKind::Locked => "locked",
            ErrorKind::InvalidRatings => "invalid_ratings",
            ErrorKind::InvalidDecision => "invalid_decision",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Storage => "storage",
            ErrorKind::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialisable `{kind, reason}` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub reason: String,
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

/// Result type for Judgeflow domain operations.
pub type Result<T> = std::result::Result<T, ReviewError>;
