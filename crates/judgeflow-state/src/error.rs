//! Error types for judgeflow-state

use thiserror::Error;

use crate::model::{AssignmentId, IdeaId, JudgeId};

/// Errors that can occur while connecting to or preparing the database
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

fn join_ids<T: std::fmt::Display>(ids: &[T]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcomes of catalog and assignment store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("idea not found: {idea_id}")]
    IdeaNotFound { idea_id: IdeaId },

    #[error("judge not found: {}", join_ids(.judge_ids))]
    JudgeNotFound { judge_ids: Vec<JudgeId> },

    #[error("assignment not found: {assignment_id}")]
    AssignmentNotFound { assignment_id: AssignmentId },

    #[error("already assigned to idea {idea_id}: {}", join_ids(.judge_ids))]
    DuplicateAssignment {
        idea_id: IdeaId,
        judge_ids: Vec<JudgeId>,
    },

    #[error(
        "idea {idea_id} allows at most {max_judges} judges: {current} assigned, {requested} requested"
    )]
    CapacityExceeded {
        idea_id: IdeaId,
        max_judges: u32,
        current: usize,
        requested: usize,
    },

    #[error("assignment {assignment_id} is locked")]
    Locked { assignment_id: AssignmentId },

    /// Concurrent transaction touched the same records; safe to retry reads.
    #[error("storage conflict: {0}")]
    Conflict(String),

    /// Backend unreachable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    /// A persisted row could not be mapped back to the model.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StorageError {
    /// Transient failures may succeed when repeated.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Conflict(_) | StorageError::Unavailable(_))
    }

    /// Classify a raw SurrealDB error.
    pub(crate) fn from_surreal(err: surrealdb::Error) -> Self {
        Self::classify(err.to_string())
    }

    pub(crate) fn classify(message: String) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("conflict") || lower.contains("can be retried") {
            StorageError::Conflict(message)
        } else if lower.contains("connection")
            || lower.contains("timed out")
            || lower.contains("not connected")
        {
            StorageError::Unavailable(message)
        } else {
            StorageError::Backend(message)
        }
    }
}
