//! Evaluation engine: judges open and submit evaluations.
//!
//! Preconditions are checked in a fixed order: caller role, assignment
//! existence and ownership, lock state, ratings, decision. Input is fully
//! validated before anything is written, so a refused submission never
//! touches a stored evaluation.

use std::sync::Arc;

use chrono::Utc;
use judgeflow_state::{Assignment, AssignmentId, Evaluation, ReviewStore};

use crate::access::Caller;
use crate::domain::{validate_decision, validate_ratings, Result, ReviewError};
use crate::metrics::METRICS;
use crate::obs;

pub struct EvaluationEngine<S: ?Sized> {
    store: Arc<S>,
}

impl<S> EvaluationEngine<S>
where
    S: ReviewStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Fetch an assignment the caller holds, refusing locked ones.
    async fn held_unlocked(
        &self,
        caller: &Caller,
        assignment_id: &AssignmentId,
    ) -> Result<Assignment> {
        caller.require_judge()?;
        let assignment = self.store.get(assignment_id).await?;
        caller.require_holder(&assignment)?;
        if assignment.is_locked() {
            return Err(ReviewError::Locked {
                assignment_id: assignment.id,
            });
        }
        Ok(assignment)
    }

    /// A judge starts working on an assignment: `PENDING` becomes
    /// `IN_PROGRESS`; other statuses are returned unchanged.
    pub async fn open(&self, caller: &Caller, assignment_id: &AssignmentId) -> Result<Assignment> {
        let outcome = async {
            self.held_unlocked(caller, assignment_id).await?;
            let opened = self.store.open_evaluation(assignment_id).await?;
            obs::emit_evaluation_opened(&opened);
            Ok::<_, ReviewError>(opened)
        }
        .await;
        outcome.map_err(|e| obs::track_failure("evaluation.open", caller, e))
    }

    /// Store ten ratings and a decision, replacing any earlier evaluation,
    /// and mark the assignment `REVIEWED`.
    pub async fn submit_decision(
        &self,
        caller: &Caller,
        assignment_id: &AssignmentId,
        ratings: &[i64],
        decision: &str,
    ) -> Result<Assignment> {
        let outcome = async {
            self.held_unlocked(caller, assignment_id).await?;
            let ratings = validate_ratings(ratings)?;
            let decision = validate_decision(decision)?;

            let evaluation = Evaluation::new(ratings, decision, Utc::now());
            // The store re-checks the lock inside its own critical section.
            let updated = self
                .store
                .record_evaluation(assignment_id, evaluation)
                .await?;

            obs::emit_evaluation_submitted(&updated);
            METRICS.inc_evaluations_submitted();
            Ok::<_, ReviewError>(updated)
        }
        .await;
        outcome.map_err(|e| obs::track_failure("evaluation.submit", caller, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use judgeflow_state::{
        AssignmentStatus, AssignmentStore, Catalog, Decision, Idea, IdeaId, Judge, JudgeId,
        MemoryReviewStore, Submitter,
    };

    const RATINGS: [i64; 10] = [8, 7, 9, 6, 10, 5, 8, 7, 9, 6];

    async fn setup() -> (Arc<MemoryReviewStore>, EvaluationEngine<MemoryReviewStore>, Assignment) {
        let store = Arc::new(MemoryReviewStore::new());
        store
            .put_idea(Idea {
                id: IdeaId::from("X"),
                title: "Solar".into(),
                track: "energy".into(),
                submitter: Submitter {
                    name: "N".into(),
                    email: None,
                },
                submitted_at: Utc::now(),
                files: vec![],
                max_judges: None,
            })
            .await
            .unwrap();
        store
            .put_judge(Judge {
                id: JudgeId::from("J1"),
                display_name: "One".into(),
                credential_ref: None,
                capacity: None,
            })
            .await
            .unwrap();
        let a = store
            .create(&IdeaId::from("X"), &[JudgeId::from("J1")])
            .await
            .unwrap()
            .remove(0);
        (store.clone(), EvaluationEngine::new(store), a)
    }

    fn j1() -> Caller {
        Caller::Judge(JudgeId::from("J1"))
    }

    #[tokio::test]
    async fn submit_yields_score_and_review() {
        let (_, engine, a) = setup().await;
        let updated = engine
            .submit_decision(&j1(), &a.id, &RATINGS, "APPROVED")
            .await
            .unwrap();
        assert_eq!(updated.status, AssignmentStatus::Reviewed);
        let evaluation = updated.evaluation.unwrap();
        assert_eq!(evaluation.final_score, 75);
        assert_eq!(evaluation.decision, Decision::Approved);
        assert!(updated.decision_at.is_some());
    }

    #[tokio::test]
    async fn invalid_input_keeps_prior_evaluation() {
        let (store, engine, a) = setup().await;
        engine
            .submit_decision(&j1(), &a.id, &RATINGS, "APPROVED")
            .await
            .unwrap();

        let err = engine
            .submit_decision(&j1(), &a.id, &[5; 9], "REJECTED")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRatings);

        let err = engine
            .submit_decision(&j1(), &a.id, &[5, 5, 5, 5, 0, 5, 5, 5, 5, 5], "REJECTED")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("[4]"));

        let err = engine
            .submit_decision(&j1(), &a.id, &[5; 10], "MAYBE")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDecision);

        for label in ["ACCEPTED", "approved", " REJECTED "] {
            let err = engine
                .submit_decision(&j1(), &a.id, &[5; 10], label)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidDecision, "{label:?}");
        }

        let stored = store.get(&a.id).await.unwrap().evaluation.unwrap();
        assert_eq!(stored.final_score, 75);
        assert_eq!(stored.decision, Decision::Approved);
    }

    #[tokio::test]
    async fn locked_refuses_submission_and_open() {
        let (store, engine, a) = setup().await;
        store.lock(&a.id).await.unwrap();

        let err = engine
            .submit_decision(&j1(), &a.id, &RATINGS, "APPROVED")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Locked);
        assert!(store.get(&a.id).await.unwrap().evaluation.is_none());

        let err = engine.open(&j1(), &a.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Locked);
    }

    #[tokio::test]
    async fn locked_is_reported_before_bad_ratings() {
        let (store, engine, a) = setup().await;
        store.lock(&a.id).await.unwrap();
        let err = engine
            .submit_decision(&j1(), &a.id, &[0; 3], "nonsense")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Locked);
    }

    #[tokio::test]
    async fn only_the_holder_may_evaluate() {
        let (_, engine, a) = setup().await;
        let other = Caller::Judge(JudgeId::from("J2"));
        let err = engine
            .submit_decision(&other, &a.id, &RATINGS, "APPROVED")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let err = engine
            .submit_decision(&Caller::Anonymous, &a.id, &RATINGS, "APPROVED")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);

        let err = engine
            .submit_decision(&j1(), &AssignmentId::from("nope"), &RATINGS, "APPROVED")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn open_moves_pending_to_in_progress() {
        let (_, engine, a) = setup().await;
        let opened = engine.open(&j1(), &a.id).await.unwrap();
        assert_eq!(opened.status, AssignmentStatus::InProgress);

        let submitted = engine
            .submit_decision(&j1(), &a.id, &RATINGS, "REJECTED")
            .await
            .unwrap();
        assert_eq!(submitted.status, AssignmentStatus::Reviewed);
    }
}
