//! Storage trait definitions for Judgeflow
//!
//! These traits define the storage abstractions:
//! - `Catalog`: read access to ideas and judges (plus provisioning writes)
//! - `AssignmentStore`: assignment lifecycle and evaluation persistence
//!
//! All traits are async and backend-agnostic. In-memory implementations
//! live in the `fakes` module, SurrealDB ones in `surreal_store`.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::capacity::CapacityPolicy;
use crate::error::StorageError;
use crate::model::{
    Assignment, AssignmentId, Evaluation, Idea, IdeaAssignments, IdeaId, Judge, JudgeId,
};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Ideas and judges, owned by the submission and provisioning flows.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Insert or replace an idea.
    async fn put_idea(&self, idea: Idea) -> StorageResult<()>;

    /// Fetch an idea. Returns `StorageError::IdeaNotFound` if absent.
    async fn get_idea(&self, idea_id: &IdeaId) -> StorageResult<Idea>;

    /// All ideas, oldest submission first.
    async fn list_ideas(&self) -> StorageResult<Vec<Idea>>;

    /// Insert or replace a judge.
    async fn put_judge(&self, judge: Judge) -> StorageResult<()>;

    /// Fetch a judge. Returns `StorageError::JudgeNotFound` if absent.
    async fn get_judge(&self, judge_id: &JudgeId) -> StorageResult<Judge>;

    /// All judges ordered by id.
    async fn list_judges(&self) -> StorageResult<Vec<Judge>>;
}

// ---------------------------------------------------------------------------
// AssignmentStore
// ---------------------------------------------------------------------------

/// Assignment lifecycle.
///
/// Guarantees:
/// - At most one assignment exists per `(idea, judge)` pair.
/// - The number of assignments for an idea never exceeds its effective
///   `max_judges` at the moment of creation.
/// - `create` is all-or-nothing and checks capacity against the post-batch
///   count; concurrent creates for one idea are serialised.
/// - A locked assignment can never be deleted or re-evaluated; lock and
///   delete on the same assignment never both succeed.
/// - Evaluation writes for one assignment never interleave.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Capacity configuration used to resolve `max_judges`.
    fn capacity_policy(&self) -> CapacityPolicy;

    /// Assignments for an idea in creation order, with its effective capacity.
    async fn list_for_idea(&self, idea_id: &IdeaId) -> StorageResult<IdeaAssignments>;

    /// Assign every judge in `judge_ids` to the idea, or none of them.
    async fn create(
        &self,
        idea_id: &IdeaId,
        judge_ids: &[JudgeId],
    ) -> StorageResult<Vec<Assignment>>;

    /// Remove an unlocked assignment.
    async fn delete(&self, assignment_id: &AssignmentId) -> StorageResult<()>;

    /// Freeze an assignment. Idempotent.
    async fn lock(&self, assignment_id: &AssignmentId) -> StorageResult<Assignment>;

    /// Fetch one assignment.
    async fn get(&self, assignment_id: &AssignmentId) -> StorageResult<Assignment>;

    /// Every assignment held by a judge, in creation order.
    async fn list_for_judge(&self, judge_id: &JudgeId) -> StorageResult<Vec<Assignment>>;

    /// Mark a `PENDING` assignment `IN_PROGRESS`; other unlocked statuses
    /// are left unchanged.
    async fn open_evaluation(&self, assignment_id: &AssignmentId) -> StorageResult<Assignment>;

    /// Replace the assignment's evaluation and mark it `REVIEWED`.
    async fn record_evaluation(
        &self,
        assignment_id: &AssignmentId,
        evaluation: Evaluation,
    ) -> StorageResult<Assignment>;
}

/// A backend serving both the catalog and the assignment lifecycle.
pub trait ReviewStore: Catalog + AssignmentStore {}

impl<T: Catalog + AssignmentStore + ?Sized> ReviewStore for T {}

/// Drop repeated judge ids, keeping first-seen order.
pub fn dedup_judges(judge_ids: &[JudgeId]) -> Vec<JudgeId> {
    let mut seen = HashSet::new();
    judge_ids
        .iter()
        .filter(|id| seen.insert((*id).clone()))
        .cloned()
        .collect()
}
