//! Data model for the assignment workflow
//!
//! - `Idea` / `Judge`: catalog records created by external flows
//! - `Assignment`: one judge's responsibility to review one idea
//! - `Evaluation`: the judge's rating vector, decision and derived score
//!
//! Status and decision vocabularies are closed enums. Strings coming from
//! persisted data or callers are parsed once at the boundary.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::file_ref::FileRef;

/// Number of questions every evaluation answers.
pub const RATING_COUNT: usize = 10;
/// Lowest admissible rating.
pub const RATING_MIN: i64 = 1;
/// Highest admissible rating.
pub const RATING_MAX: i64 = 10;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifier of a submitted idea.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdeaId(pub String);

impl IdeaId {
    pub fn new(id: impl Into<String>) -> Self {
        IdeaId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdeaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for IdeaId {
    fn from(s: &str) -> Self {
        IdeaId(s.to_string())
    }
}

/// Identifier of a judge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JudgeId(pub String);

impl JudgeId {
    pub fn new(id: impl Into<String>) -> Self {
        JudgeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JudgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JudgeId {
    fn from(s: &str) -> Self {
        JudgeId(s.to_string())
    }
}

/// Unique identifier for an assignment, generated by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentId(pub String);

impl AssignmentId {
    /// Generate a new random AssignmentId
    pub fn generate() -> Self {
        AssignmentId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AssignmentId {
    fn from(s: &str) -> Self {
        AssignmentId(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Vocabularies
// ---------------------------------------------------------------------------

/// Error raised when a persisted or caller-supplied label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("unknown assignment status: {0}")]
    UnknownStatus(String),

    #[error("unknown decision: {0}")]
    UnknownDecision(String),
}

/// Review progress of an assignment. The lock flag is kept separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Pending,
    InProgress,
    Submitted,
    Reviewed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "PENDING",
            AssignmentStatus::InProgress => "IN_PROGRESS",
            AssignmentStatus::Submitted => "SUBMITTED",
            AssignmentStatus::Reviewed => "REVIEWED",
        }
    }

    pub fn is_reviewed(&self) -> bool {
        matches!(self, AssignmentStatus::Reviewed)
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentStatus {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(AssignmentStatus::Pending),
            "IN_PROGRESS" => Ok(AssignmentStatus::InProgress),
            "SUBMITTED" => Ok(AssignmentStatus::Submitted),
            "REVIEWED" => Ok(AssignmentStatus::Reviewed),
            _ => Err(LabelError::UnknownStatus(s.to_string())),
        }
    }
}

/// Status as shown to callers: `LOCKED` overrides the progress status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusLabel {
    Pending,
    InProgress,
    Submitted,
    Reviewed,
    Locked,
}

impl StatusLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLabel::Pending => "PENDING",
            StatusLabel::InProgress => "IN_PROGRESS",
            StatusLabel::Submitted => "SUBMITTED",
            StatusLabel::Reviewed => "REVIEWED",
            StatusLabel::Locked => "LOCKED",
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accept/reject outcome of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "APPROVED",
            Decision::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = LabelError;

    /// Exact labels only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(Decision::Approved),
            "REJECTED" => Ok(Decision::Rejected),
            _ => Err(LabelError::UnknownDecision(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Ratings / Evaluation
// ---------------------------------------------------------------------------

/// Why a rating vector was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "expected {} ratings in [{}, {}], got {count}{}",
    RATING_COUNT,
    RATING_MIN,
    RATING_MAX,
    describe_indices(.out_of_range)
)]
pub struct RatingsError {
    /// Number of ratings supplied.
    pub count: usize,
    /// Zero-based indices whose value lies outside the admissible range.
    pub out_of_range: Vec<usize>,
}

fn describe_indices(indices: &[usize]) -> String {
    if indices.is_empty() {
        return String::new();
    }
    let list: Vec<String> = indices.iter().map(|i| i.to_string()).collect();
    format!("; out of range at indices [{}]", list.join(", "))
}

/// Exactly ten ratings, each in `[1, 10]`.
///
/// The only way to obtain a value is through [`Ratings::new`], so a
/// `Ratings` held anywhere in the system is always complete and in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<i64>")]
pub struct Ratings([u8; RATING_COUNT]);

impl Ratings {
    /// Validate a raw rating vector.
    pub fn new(values: &[i64]) -> Result<Self, RatingsError> {
        let out_of_range: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, v)| !(RATING_MIN..=RATING_MAX).contains(*v))
            .map(|(i, _)| i)
            .collect();

        if values.len() != RATING_COUNT || !out_of_range.is_empty() {
            return Err(RatingsError {
                count: values.len(),
                out_of_range,
            });
        }

        let mut ratings = [0u8; RATING_COUNT];
        for (slot, value) in ratings.iter_mut().zip(values) {
            // Range-checked above.
            *slot = *value as u8;
        }
        Ok(Ratings(ratings))
    }

    pub fn values(&self) -> &[u8] {
        &self.0
    }

    /// Sum of all ratings; always in `[10, 100]`.
    pub fn final_score(&self) -> u32 {
        self.0.iter().map(|v| u32::from(*v)).sum()
    }

    /// Mean rating per question.
    pub fn average(&self) -> f64 {
        f64::from(self.final_score()) / RATING_COUNT as f64
    }
}

impl TryFrom<Vec<i64>> for Ratings {
    type Error = RatingsError;

    fn try_from(values: Vec<i64>) -> Result<Self, Self::Error> {
        Ratings::new(&values)
    }
}

impl From<Ratings> for Vec<i64> {
    fn from(ratings: Ratings) -> Self {
        ratings.0.iter().map(|v| i64::from(*v)).collect()
    }
}

/// A judge's submitted evaluation, embedded in its assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub ratings: Ratings,
    pub decision: Decision,
    pub submitted_at: DateTime<Utc>,
    /// Derived: always `ratings.final_score()`.
    pub final_score: u32,
}

impl Evaluation {
    pub fn new(ratings: Ratings, decision: Decision, submitted_at: DateTime<Utc>) -> Self {
        Self {
            final_score: ratings.final_score(),
            ratings,
            decision,
            submitted_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// One judge's responsibility to review one idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub idea_id: IdeaId,
    pub judge_id: JudgeId,
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
    /// Set once by `lock`; never cleared.
    pub locked_at: Option<DateTime<Utc>>,
    /// Timestamp of the latest accepted decision.
    pub decision_at: Option<DateTime<Utc>>,
    pub evaluation: Option<Evaluation>,
}

impl Assignment {
    /// A fresh `PENDING` assignment.
    pub fn pending(idea_id: IdeaId, judge_id: JudgeId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: AssignmentId::generate(),
            idea_id,
            judge_id,
            status: AssignmentStatus::Pending,
            created_at,
            locked_at: None,
            decision_at: None,
            evaluation: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    /// External status label.
    pub fn label(&self) -> StatusLabel {
        if self.is_locked() {
            return StatusLabel::Locked;
        }
        match self.status {
            AssignmentStatus::Pending => StatusLabel::Pending,
            AssignmentStatus::InProgress => StatusLabel::InProgress,
            AssignmentStatus::Submitted => StatusLabel::Submitted,
            AssignmentStatus::Reviewed => StatusLabel::Reviewed,
        }
    }

    /// Still waiting on the judge: neither reviewed nor frozen.
    pub fn is_open(&self) -> bool {
        !self.is_locked() && !self.status.is_reviewed()
    }
}

/// Output of the per-idea listing: assignments in creation order plus the
/// effective capacity for the idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeaAssignments {
    pub idea_id: IdeaId,
    pub assignments: Vec<Assignment>,
    pub max_judges: u32,
}

// ---------------------------------------------------------------------------
// Catalog records
// ---------------------------------------------------------------------------

/// Who submitted an idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submitter {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A submitted idea. Read-only to the assignment workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idea {
    pub id: IdeaId,
    pub title: String,
    pub track: String,
    pub submitter: Submitter,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub files: Vec<FileRef>,
    /// Per-idea capacity override; the system default applies when unset.
    #[serde(default)]
    pub max_judges: Option<u32>,
}

/// An evaluator identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judge {
    pub id: JudgeId,
    pub display_name: String,
    /// Reference into the external credential store.
    #[serde(default)]
    pub credential_ref: Option<String>,
    /// Maximum concurrent open assignments this judge should carry.
    #[serde(default)]
    pub capacity: Option<u32>,
}
