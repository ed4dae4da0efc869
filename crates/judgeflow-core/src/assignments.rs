//! Administrator operations on assignments.

use std::sync::Arc;

use judgeflow_state::{Assignment, AssignmentId, Idea, IdeaAssignments, IdeaId, JudgeId, ReviewStore};
use tracing::Instrument;

use crate::access::Caller;
use crate::domain::{Result, ReviewError};
use crate::metrics::METRICS;
use crate::obs;
use crate::retry::{with_read_retry, RetryPolicy};

/// Thin API layer over a review store for the admin role.
pub struct AssignmentApi<S: ?Sized> {
    store: Arc<S>,
    retry: RetryPolicy,
}

impl<S> AssignmentApi<S>
where
    S: ReviewStore + ?Sized,
{
    pub fn new(store: Arc<S>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Assignments of an idea in creation order, plus its effective capacity.
    pub async fn list(&self, caller: &Caller, idea_id: &IdeaId) -> Result<IdeaAssignments> {
        let outcome = async {
            caller.require_admin()?;
            let listed = with_read_retry(&self.retry, "assignment.list", || {
                self.store.list_for_idea(idea_id)
            })
            .await?;
            Ok::<_, ReviewError>(listed)
        }
        .instrument(obs::idea_span(idea_id))
        .await;
        outcome.map_err(|e| obs::track_failure("assignment.list", caller, e))
    }

    /// Assign every judge in `judge_ids` to the idea, or none of them.
    ///
    /// Repeated ids in `judge_ids` count once.
    pub async fn create(
        &self,
        caller: &Caller,
        idea_id: &IdeaId,
        judge_ids: &[JudgeId],
    ) -> Result<Vec<Assignment>> {
        let outcome = async {
            caller.require_admin()?;
            let created = self.store.create(idea_id, judge_ids).await?;
            obs::emit_assignments_created(idea_id, &created);
            METRICS.add_assignments_created(created.len() as u64);
            Ok::<_, ReviewError>(created)
        }
        .instrument(obs::idea_span(idea_id))
        .await;
        outcome.map_err(|e| obs::track_failure("assignment.create", caller, e))
    }

    /// Remove an unlocked assignment.
    pub async fn delete(&self, caller: &Caller, assignment_id: &AssignmentId) -> Result<()> {
        let outcome = async {
            caller.require_admin()?;
            self.store.delete(assignment_id).await?;
            obs::emit_assignment_deleted(assignment_id);
            METRICS.inc_assignments_deleted();
            Ok::<_, ReviewError>(())
        }
        .await;
        outcome.map_err(|e| obs::track_failure("assignment.delete", caller, e))
    }

    /// Freeze an assignment. Locking a locked assignment succeeds unchanged.
    pub async fn lock(&self, caller: &Caller, assignment_id: &AssignmentId) -> Result<Assignment> {
        let outcome = async {
            caller.require_admin()?;
            let locked = self.store.lock(assignment_id).await?;
            obs::emit_assignment_locked(&locked);
            METRICS.inc_assignments_locked();
            Ok::<_, ReviewError>(locked)
        }
        .await;
        outcome.map_err(|e| obs::track_failure("assignment.lock", caller, e))
    }

    /// Every idea in the catalog, oldest submission first.
    pub async fn ideas(&self, caller: &Caller) -> Result<Vec<Idea>> {
        let outcome = async {
            caller.require_admin()?;
            let ideas =
                with_read_retry(&self.retry, "idea.list", || self.store.list_ideas()).await?;
            Ok::<_, ReviewError>(ideas)
        }
        .await;
        outcome.map_err(|e| obs::track_failure("idea.list", caller, e))
    }
}
