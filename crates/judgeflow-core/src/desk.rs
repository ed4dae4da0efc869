//! The judge's desk: assigned ideas with status, evaluation and totals.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use judgeflow_state::{
    Assignment, AssignmentId, Decision, Evaluation, Idea, IdeaId, JudgeId, ReviewStore,
    StatusLabel, StorageError,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::access::Caller;
use crate::domain::{Result, ReviewError};
use crate::file_gateway::DocumentLinker;
use crate::obs;
use crate::retry::{with_read_retry, RetryPolicy};

/// What a judge sees of an idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeaSummary {
    pub id: IdeaId,
    pub title: String,
    pub track: String,
    pub submitted_at: DateTime<Utc>,
    /// Link to the first attached document.
    pub document_url: Option<String>,
}

impl IdeaSummary {
    pub fn from_idea(idea: &Idea, linker: &DocumentLinker) -> Self {
        Self {
            id: idea.id.clone(),
            title: idea.title.clone(),
            track: idea.track.clone(),
            submitted_at: idea.submitted_at,
            document_url: idea.files.first().map(|f| linker.link(f)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskEntry {
    pub assignment_id: AssignmentId,
    pub idea: IdeaSummary,
    pub status: StatusLabel,
    pub evaluation: Option<Evaluation>,
}

/// Counters shown above the desk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskStats {
    pub total: usize,
    /// Neither reviewed nor locked.
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub locked: usize,
}

impl DeskStats {
    pub fn tally(assignments: &[Assignment]) -> Self {
        let mut stats = DeskStats {
            total: assignments.len(),
            ..Self::default()
        };
        for assignment in assignments {
            if assignment.is_open() {
                stats.pending += 1;
            }
            if assignment.is_locked() {
                stats.locked += 1;
            }
            match assignment.evaluation.as_ref().map(|e| e.decision) {
                Some(Decision::Approved) => stats.approved += 1,
                Some(Decision::Rejected) => stats.rejected += 1,
                None => {}
            }
        }
        stats
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeDesk {
    pub judge_id: JudgeId,
    pub entries: Vec<DeskEntry>,
    pub stats: DeskStats,
}

pub struct DeskApi<S: ?Sized> {
    store: Arc<S>,
    retry: RetryPolicy,
    linker: DocumentLinker,
}

impl<S> DeskApi<S>
where
    S: ReviewStore + ?Sized,
{
    pub fn new(store: Arc<S>, retry: RetryPolicy, linker: DocumentLinker) -> Self {
        Self {
            store,
            retry,
            linker,
        }
    }

    /// The calling judge's assignments, oldest first.
    pub async fn desk(&self, caller: &Caller) -> Result<JudgeDesk> {
        let outcome = self.build(caller).await;
        outcome.map_err(|e| obs::track_failure("desk.list", caller, e))
    }

    async fn build(&self, caller: &Caller) -> Result<JudgeDesk> {
        let judge_id = caller.require_judge()?;
        let held = with_read_retry(&self.retry, "desk.list", || {
            self.store.list_for_judge(judge_id)
        })
        .await?;

        let mut ideas: HashMap<IdeaId, Option<IdeaSummary>> = HashMap::new();
        let mut entries = Vec::with_capacity(held.len());
        for assignment in &held {
            if !ideas.contains_key(&assignment.idea_id) {
                let summary = self.summary(&assignment.idea_id).await?;
                ideas.insert(assignment.idea_id.clone(), summary);
            }
            let Some(Some(idea)) = ideas.get(&assignment.idea_id) else {
                warn!(
                    assignment_id = %assignment.id,
                    idea_id = %assignment.idea_id,
                    "assigned idea missing from catalog; skipping"
                );
                continue;
            };
            entries.push(DeskEntry {
                assignment_id: assignment.id.clone(),
                idea: idea.clone(),
                status: assignment.label(),
                evaluation: assignment.evaluation.clone(),
            });
        }

        Ok(JudgeDesk {
            judge_id: judge_id.clone(),
            entries,
            stats: DeskStats::tally(&held),
        })
    }

    async fn summary(&self, idea_id: &IdeaId) -> Result<Option<IdeaSummary>> {
        match with_read_retry(&self.retry, "desk.idea", || self.store.get_idea(idea_id)).await {
            Ok(idea) => Ok(Some(IdeaSummary::from_idea(&idea, &self.linker))),
            Err(StorageError::IdeaNotFound { .. }) => Ok(None),
            Err(e) => Err(ReviewError::from(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use judgeflow_state::{
        AssignmentStore, Catalog, FileRef, Judge, MemoryReviewStore, Ratings, Submitter,
    };

    async fn seed() -> Arc<MemoryReviewStore> {
        let store = Arc::new(MemoryReviewStore::new());
        for (id, title) in [("A", "Alpha"), ("B", "Beta"), ("C", "Gamma")] {
            store
                .put_idea(Idea {
                    id: IdeaId::from(id),
                    title: title.into(),
                    track: "health".into(),
                    submitter: Submitter {
                        name: "S".into(),
                        email: Some("s@x.org".into()),
                    },
                    submitted_at: Utc::now(),
                    files: vec![FileRef::new("s@x.org", "plan final.pdf")],
                    max_judges: None,
                })
                .await
                .unwrap();
        }
        store
            .put_judge(Judge {
                id: JudgeId::from("J1"),
                display_name: "Judge One".into(),
                credential_ref: None,
                capacity: Some(5),
            })
            .await
            .unwrap();
        store
    }

    fn api(store: Arc<MemoryReviewStore>) -> DeskApi<MemoryReviewStore> {
        DeskApi::new(
            store,
            RetryPolicy::none(),
            DocumentLinker::new("", "/api/admin/files"),
        )
    }

    #[tokio::test]
    async fn desk_lists_entries_and_stats() {
        let store = seed().await;
        let j1 = JudgeId::from("J1");
        let mut ids = Vec::new();
        for idea in ["A", "B", "C"] {
            let a = store
                .create(&IdeaId::from(idea), std::slice::from_ref(&j1))
                .await
                .unwrap();
            ids.push(a[0].id.clone());
        }
        let ratings = Ratings::new(&[5; 10]).unwrap();
        store
            .record_evaluation(&ids[0], Evaluation::new(ratings, Decision::Approved, Utc::now()))
            .await
            .unwrap();
        store
            .record_evaluation(&ids[1], Evaluation::new(ratings, Decision::Rejected, Utc::now()))
            .await
            .unwrap();
        store.lock(&ids[1]).await.unwrap();

        let desk = api(store).desk(&Caller::Judge(j1)).await.unwrap();
        assert_eq!(desk.entries.len(), 3);
        assert_eq!(
            desk.stats,
            DeskStats {
                total: 3,
                pending: 1,
                approved: 1,
                rejected: 1,
                locked: 1,
            }
        );
        assert_eq!(desk.entries[0].status, StatusLabel::Reviewed);
        assert_eq!(desk.entries[1].status, StatusLabel::Locked);
        assert_eq!(desk.entries[2].status, StatusLabel::Pending);
        assert_eq!(
            desk.entries[0].idea.document_url.as_deref(),
            Some("/api/admin/files/s%40x.org/plan%20final.pdf")
        );
    }

    #[tokio::test]
    async fn empty_desk_and_roles() {
        let store = seed().await;
        let api = api(store);
        let desk = api
            .desk(&Caller::Judge(JudgeId::from("nobody")))
            .await
            .unwrap();
        assert!(desk.entries.is_empty());
        assert_eq!(desk.stats, DeskStats::default());

        let err = api.desk(&Caller::Admin).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }
}
