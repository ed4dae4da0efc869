//! Trait contract tests for Catalog and AssignmentStore.
//!
//! Every contract runs against both the in-memory store and the SurrealDB
//! store (in-memory engine). Any conforming implementation must pass these.

use std::sync::Arc;

use chrono::{Duration, Utc};
use judgeflow_state::storage_traits::*;
use judgeflow_state::{
    Assignment, AssignmentId, AssignmentStatus, CapacityPolicy, Decision, Evaluation, FileRef,
    Idea, IdeaId, Judge, JudgeId, MemoryReviewStore, Ratings, StatusLabel, StorageError,
    Submitter, SurrealReviewStore,
};

// ===========================================================================
// Fixtures
// ===========================================================================

fn idea(id: &str, max_judges: Option<u32>) -> Idea {
    Idea {
        id: IdeaId::from(id),
        title: format!("Idea {id}"),
        track: "health".to_string(),
        submitter: Submitter {
            name: "Sara".to_string(),
            email: Some("sara@example.org".to_string()),
        },
        submitted_at: Utc::now(),
        files: vec![FileRef::new("owner-1", "%D8%B7%D8%B1%D8%AD.pdf")],
        max_judges,
    }
}

fn judge(id: &str) -> Judge {
    Judge {
        id: JudgeId::from(id),
        display_name: format!("Judge {id}"),
        credential_ref: None,
        capacity: None,
    }
}

fn judges(ids: &[&str]) -> Vec<JudgeId> {
    ids.iter().map(|id| JudgeId::from(*id)).collect()
}

fn evaluation(values: &[i64], decision: Decision) -> Evaluation {
    Evaluation::new(Ratings::new(values).unwrap(), decision, Utc::now())
}

const SCENARIO_RATINGS: [i64; 10] = [8, 7, 9, 6, 10, 5, 8, 7, 9, 6];

/// Seed idea `X` (capacity 2), idea `Y` (default capacity) and judges J1..J5.
async fn seed<S: ReviewStore + ?Sized>(store: &S) {
    store.put_idea(idea("X", Some(2))).await.unwrap();
    store.put_idea(idea("Y", None)).await.unwrap();
    for id in ["J1", "J2", "J3", "J4", "J5"] {
        store.put_judge(judge(id)).await.unwrap();
    }
}

async fn memory() -> Arc<MemoryReviewStore> {
    let store = Arc::new(MemoryReviewStore::new());
    seed(store.as_ref()).await;
    store
}

async fn surreal() -> Arc<SurrealReviewStore> {
    let store = Arc::new(SurrealReviewStore::in_memory().await.unwrap());
    seed(store.as_ref()).await;
    store
}

// ===========================================================================
// Contracts
// ===========================================================================

async fn capacity_blocks_third_judge<S: ReviewStore + ?Sized>(store: &S) {
    let x = IdeaId::from("X");
    let created = store.create(&x, &judges(&["J1", "J2"])).await.unwrap();
    assert_eq!(created.len(), 2);
    assert!(created
        .iter()
        .all(|a| a.status == AssignmentStatus::Pending && !a.is_locked()));

    let err = store.create(&x, &judges(&["J3"])).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::CapacityExceeded {
            max_judges: 2,
            current: 2,
            requested: 1,
            ..
        }
    ));
    assert_eq!(store.list_for_idea(&x).await.unwrap().assignments.len(), 2);
}

async fn batch_checked_as_a_whole<S: ReviewStore + ?Sized>(store: &S) {
    let x = IdeaId::from("X");
    store.create(&x, &judges(&["J1"])).await.unwrap();

    let err = store.create(&x, &judges(&["J2", "J3"])).await.unwrap_err();
    assert!(matches!(err, StorageError::CapacityExceeded { .. }));

    let listed = store.list_for_idea(&x).await.unwrap();
    assert_eq!(listed.assignments.len(), 1, "no partial batch");
}

async fn duplicate_is_rejected<S: ReviewStore + ?Sized>(store: &S) {
    let x = IdeaId::from("X");
    store.create(&x, &judges(&["J1"])).await.unwrap();

    match store.create(&x, &judges(&["J1"])).await.unwrap_err() {
        StorageError::DuplicateAssignment { judge_ids, idea_id } => {
            assert_eq!(idea_id, x);
            assert_eq!(judge_ids, judges(&["J1"]));
        }
        other => panic!("expected DuplicateAssignment, got {other:?}"),
    }
    assert_eq!(store.list_for_idea(&x).await.unwrap().assignments.len(), 1);
}

async fn duplicate_fails_whole_batch<S: ReviewStore + ?Sized>(store: &S) {
    let y = IdeaId::from("Y");
    store.create(&y, &judges(&["J1"])).await.unwrap();

    let err = store.create(&y, &judges(&["J2", "J1"])).await.unwrap_err();
    assert!(matches!(err, StorageError::DuplicateAssignment { .. }));
    let listed = store.list_for_idea(&y).await.unwrap();
    assert_eq!(listed.assignments.len(), 1);
    assert_eq!(listed.assignments[0].judge_id, JudgeId::from("J1"));
}

async fn duplicate_names_opaque_judge_ids<S: ReviewStore + ?Sized>(store: &S) {
    let y = IdeaId::from("Y");
    store.put_judge(judge("Doe, Jane")).await.unwrap();
    store.create(&y, &judges(&["Doe, Jane", "J1"])).await.unwrap();

    match store
        .create(&y, &judges(&["J2", "Doe, Jane"]))
        .await
        .unwrap_err()
    {
        StorageError::DuplicateAssignment { judge_ids, .. } => {
            assert_eq!(judge_ids, judges(&["Doe, Jane"]));
        }
        other => panic!("expected DuplicateAssignment, got {other:?}"),
    }
}

async fn create_unknown_targets<S: ReviewStore + ?Sized>(store: &S) {
    let err = store
        .create(&IdeaId::from("nope"), &judges(&["J1"]))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::IdeaNotFound { .. }));

    let err = store
        .create(&IdeaId::from("Y"), &judges(&["J1", "ghost"]))
        .await
        .unwrap_err();
    match err {
        StorageError::JudgeNotFound { judge_ids } => assert_eq!(judge_ids, judges(&["ghost"])),
        other => panic!("expected JudgeNotFound, got {other:?}"),
    }
    assert!(store
        .list_for_idea(&IdeaId::from("Y"))
        .await
        .unwrap()
        .assignments
        .is_empty());
}

async fn list_keeps_creation_order<S: ReviewStore + ?Sized>(store: &S) {
    let y = IdeaId::from("Y");
    store.create(&y, &judges(&["J3", "J1"])).await.unwrap();
    store.create(&y, &judges(&["J2"])).await.unwrap();

    let listed = store.list_for_idea(&y).await.unwrap();
    assert_eq!(listed.max_judges, 3);
    let order: Vec<&str> = listed
        .assignments
        .iter()
        .map(|a| a.judge_id.as_str())
        .collect();
    assert_eq!(order, vec!["J3", "J1", "J2"]);

    let err = store.list_for_idea(&IdeaId::from("nope")).await.unwrap_err();
    assert!(matches!(err, StorageError::IdeaNotFound { .. }));
}

async fn submit_scores_and_reviews<S: ReviewStore + ?Sized>(store: &S) {
    let x = IdeaId::from("X");
    let a1 = store.create(&x, &judges(&["J1"])).await.unwrap().remove(0);

    let updated = store
        .record_evaluation(&a1.id, evaluation(&SCENARIO_RATINGS, Decision::Approved))
        .await
        .unwrap();
    assert_eq!(updated.status, AssignmentStatus::Reviewed);
    let stored = updated.evaluation.clone().unwrap();
    assert_eq!(stored.final_score, 75);
    assert_eq!(stored.decision, Decision::Approved);
    assert_eq!(updated.decision_at, Some(stored.submitted_at));

    // Last write wins before locking.
    let again = store
        .record_evaluation(&a1.id, evaluation(&[1; 10], Decision::Rejected))
        .await
        .unwrap();
    assert_eq!(again.evaluation.unwrap().final_score, 10);
    assert_eq!(store.get(&a1.id).await.unwrap().label(), StatusLabel::Reviewed);
}

async fn lock_freezes_evaluation<S: ReviewStore + ?Sized>(store: &S) {
    let x = IdeaId::from("X");
    let a1 = store.create(&x, &judges(&["J1"])).await.unwrap().remove(0);
    store
        .record_evaluation(&a1.id, evaluation(&SCENARIO_RATINGS, Decision::Approved))
        .await
        .unwrap();

    let locked = store.lock(&a1.id).await.unwrap();
    assert!(locked.is_locked());
    assert_eq!(locked.label(), StatusLabel::Locked);

    let err = store
        .record_evaluation(&a1.id, evaluation(&[1; 10], Decision::Rejected))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Locked { .. }));

    let after = store.get(&a1.id).await.unwrap();
    let kept = after.evaluation.unwrap();
    assert_eq!(kept.final_score, 75);
    assert_eq!(kept.decision, Decision::Approved);

    let err = store.open_evaluation(&a1.id).await.unwrap_err();
    assert!(matches!(err, StorageError::Locked { .. }));
}

async fn delete_after_lock_fails<S: ReviewStore + ?Sized>(store: &S) {
    let x = IdeaId::from("X");
    let a1 = store.create(&x, &judges(&["J1"])).await.unwrap().remove(0);
    store.lock(&a1.id).await.unwrap();

    for _ in 0..2 {
        let err = store.delete(&a1.id).await.unwrap_err();
        assert!(matches!(err, StorageError::Locked { .. }));
    }
    let listed = store.list_for_idea(&x).await.unwrap();
    assert_eq!(listed.assignments.len(), 1);
    assert_eq!(listed.assignments[0].id, a1.id);
}

async fn lock_is_idempotent<S: ReviewStore + ?Sized>(store: &S) {
    let y = IdeaId::from("Y");
    let a = store.create(&y, &judges(&["J2"])).await.unwrap().remove(0);

    let first = store.lock(&a.id).await.unwrap();
    let second = store.lock(&a.id).await.unwrap();
    assert_eq!(first.locked_at, second.locked_at);
    assert_eq!(second.status, AssignmentStatus::Pending);

    let err = store.lock(&AssignmentId::from("missing")).await.unwrap_err();
    assert!(matches!(err, StorageError::AssignmentNotFound { .. }));
}

async fn delete_frees_slot<S: ReviewStore + ?Sized>(store: &S) {
    let x = IdeaId::from("X");
    let created = store.create(&x, &judges(&["J1", "J2"])).await.unwrap();
    store.delete(&created[0].id).await.unwrap();

    let err = store.delete(&created[0].id).await.unwrap_err();
    assert!(matches!(err, StorageError::AssignmentNotFound { .. }));
    let err = store.get(&created[0].id).await.unwrap_err();
    assert!(matches!(err, StorageError::AssignmentNotFound { .. }));

    // Slot and pair are both free again.
    store.create(&x, &judges(&["J1"])).await.unwrap();
    assert_eq!(store.list_for_idea(&x).await.unwrap().assignments.len(), 2);
}

async fn open_marks_in_progress<S: ReviewStore + ?Sized>(store: &S) {
    let y = IdeaId::from("Y");
    let a = store.create(&y, &judges(&["J4"])).await.unwrap().remove(0);

    let opened = store.open_evaluation(&a.id).await.unwrap();
    assert_eq!(opened.status, AssignmentStatus::InProgress);

    store
        .record_evaluation(&a.id, evaluation(&SCENARIO_RATINGS, Decision::Approved))
        .await
        .unwrap();
    let reopened = store.open_evaluation(&a.id).await.unwrap();
    assert_eq!(reopened.status, AssignmentStatus::Reviewed);
}

async fn judge_listing_spans_ideas<S: ReviewStore + ?Sized>(store: &S) {
    store
        .create(&IdeaId::from("X"), &judges(&["J5"]))
        .await
        .unwrap();
    store
        .create(&IdeaId::from("Y"), &judges(&["J5", "J1"]))
        .await
        .unwrap();

    let held = store.list_for_judge(&JudgeId::from("J5")).await.unwrap();
    let ideas: Vec<&str> = held.iter().map(|a| a.idea_id.as_str()).collect();
    assert_eq!(ideas, vec!["X", "Y"]);
    assert!(store
        .list_for_judge(&JudgeId::from("J3"))
        .await
        .unwrap()
        .is_empty());
}

async fn catalog_round_trip<S: ReviewStore + ?Sized>(store: &S) {
    let fetched = store.get_idea(&IdeaId::from("X")).await.unwrap();
    assert_eq!(fetched.max_judges, Some(2));
    assert_eq!(fetched.files[0].name(), "طرح.pdf");

    let mut older = idea("W", None);
    older.submitted_at = Utc::now() - Duration::days(1);
    store.put_idea(older).await.unwrap();
    let ids: Vec<IdeaId> = store
        .list_ideas()
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.id)
        .collect();
    assert_eq!(ids[0], IdeaId::from("W"));
    assert_eq!(ids.len(), 3);

    let listed = store.list_judges().await.unwrap();
    assert_eq!(listed.len(), 5);
    assert_eq!(listed[0].id, JudgeId::from("J1"));
    assert!(matches!(
        store.get_judge(&JudgeId::from("nobody")).await.unwrap_err(),
        StorageError::JudgeNotFound { .. }
    ));
}

async fn concurrent_creates_respect_capacity<S: ReviewStore + 'static>(store: Arc<S>) {
    let y = IdeaId::from("Y");
    let mut tasks = Vec::new();
    for id in ["J1", "J2", "J3", "J4", "J5"] {
        let store = store.clone();
        let y = y.clone();
        tasks.push(tokio::spawn(async move {
            store.create(&y, &[JudgeId::from(id)]).await
        }));
    }

    let mut succeeded = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(StorageError::CapacityExceeded { .. }) | Err(StorageError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    let listed = store.list_for_idea(&y).await.unwrap();
    assert_eq!(succeeded, listed.assignments.len());
    assert!(listed.assignments.len() <= 3);
}

async fn concurrent_same_judge_assigned_once<S: ReviewStore + 'static>(store: Arc<S>) {
    let y = IdeaId::from("Y");
    let mut tasks = Vec::new();
    for _ in 0..6 {
        let store = store.clone();
        let y = y.clone();
        tasks.push(tokio::spawn(async move {
            store.create(&y, &[JudgeId::from("J1")]).await
        }));
    }
    for task in tasks {
        let _ = task.await.unwrap();
    }
    let listed = store.list_for_idea(&y).await.unwrap();
    assert_eq!(listed.assignments.len(), 1);
}

async fn lock_delete_race_has_one_winner<S: ReviewStore + 'static>(store: Arc<S>) {
    for round in 0..10 {
        let id = format!("race-{round}");
        store.put_idea(idea(&id, None)).await.unwrap();
        let a: Assignment = store
            .create(&IdeaId::from(id.as_str()), &judges(&["J1"]))
            .await
            .unwrap()
            .remove(0);

        let (locked, deleted) = {
            let s1 = store.clone();
            let s2 = store.clone();
            let id1 = a.id.clone();
            let id2 = a.id.clone();
            tokio::join!(
                tokio::spawn(async move { s1.lock(&id1).await }),
                tokio::spawn(async move { s2.delete(&id2).await }),
            )
        };
        let locked = locked.unwrap();
        let deleted = deleted.unwrap();

        match (&locked, &deleted) {
            (Ok(_), Err(StorageError::Locked { .. })) => {
                assert!(store.get(&a.id).await.unwrap().is_locked());
            }
            (Err(StorageError::AssignmentNotFound { .. }), Ok(())) => {
                assert!(store.get(&a.id).await.is_err());
            }
            other => panic!("both or neither won: {other:?}"),
        }
    }
}

// ===========================================================================
// Per-backend instantiation
// ===========================================================================

macro_rules! contract_tests {
    ($backend:ident, $make:ident) => {
        mod $backend {
            use super::*;

            #[tokio::test]
            async fn capacity_blocks_third_judge() {
                super::capacity_blocks_third_judge($make().await.as_ref()).await;
            }

            #[tokio::test]
            async fn batch_checked_as_a_whole() {
                super::batch_checked_as_a_whole($make().await.as_ref()).await;
            }

            #[tokio::test]
            async fn duplicate_is_rejected() {
                super::duplicate_is_rejected($make().await.as_ref()).await;
            }

            #[tokio::test]
            async fn duplicate_fails_whole_batch() {
                super::duplicate_fails_whole_batch($make().await.as_ref()).await;
            }

            #[tokio::test]
            async fn duplicate_names_opaque_judge_ids() {
                super::duplicate_names_opaque_judge_ids($make().await.as_ref()).await;
            }

            #[tokio::test]
            async fn create_unknown_targets() {
                super::create_unknown_targets($make().await.as_ref()).await;
            }

            #[tokio::test]
            async fn list_keeps_creation_order() {
                super::list_keeps_creation_order($make().await.as_ref()).await;
            }

            #[tokio::test]
            async fn submit_scores_and_reviews() {
                super::submit_scores_and_reviews($make().await.as_ref()).await;
            }

            #[tokio::test]
            async fn lock_freezes_evaluation() {
                super::lock_freezes_evaluation($make().await.as_ref()).await;
            }

            #[tokio::test]
            async fn delete_after_lock_fails() {
                super::delete_after_lock_fails($make().await.as_ref()).await;
            }

            #[tokio::test]
            async fn lock_is_idempotent() {
                super::lock_is_idempotent($make().await.as_ref()).await;
            }

            #[tokio::test]
            async fn delete_frees_slot() {
                super::delete_frees_slot($make().await.as_ref()).await;
            }

            #[tokio::test]
            async fn open_marks_in_progress() {
                super::open_marks_in_progress($make().await.as_ref()).await;
            }

            #[tokio::test]
            async fn judge_listing_spans_ideas() {
                super::judge_listing_spans_ideas($make().await.as_ref()).await;
            }

            #[tokio::test]
            async fn catalog_round_trip() {
                super::catalog_round_trip($make().await.as_ref()).await;
            }

            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn concurrent_creates_respect_capacity() {
                super::concurrent_creates_respect_capacity($make().await).await;
            }

            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn concurrent_same_judge_assigned_once() {
                super::concurrent_same_judge_assigned_once($make().await).await;
            }

            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn lock_delete_race_has_one_winner() {
                super::lock_delete_race_has_one_winner($make().await).await;
            }
        }
    };
}

contract_tests!(memory_backend, memory);
contract_tests!(surreal_backend, surreal);

#[tokio::test]
async fn custom_policy_applies_to_ideas_without_override() {
    let store = MemoryReviewStore::with_policy(CapacityPolicy::new(1));
    seed(&store).await;
    let y = IdeaId::from("Y");
    store.create(&y, &judges(&["J1"])).await.unwrap();
    let err = store.create(&y, &judges(&["J2"])).await.unwrap_err();
    assert!(matches!(err, StorageError::CapacityExceeded { max_judges: 1, .. }));
}
