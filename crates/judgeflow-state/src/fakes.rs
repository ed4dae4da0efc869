//! In-memory implementation of the storage traits
//!
//! `MemoryReviewStore` satisfies the `Catalog` and `AssignmentStore`
//! contracts without external dependencies. Each idea's assignments live in
//! their own shard behind their own mutex, so work on different ideas never
//! contends; an assignment id maps to its owning idea through a side index.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::capacity::{can_assign_batch, CapacityPolicy};
use crate::error::StorageError;
use crate::keyed_lock::lock_recover;
use crate::model::*;
use crate::storage_traits::*;

/// Assignments of one idea, in creation order.
#[derive(Debug, Default)]
struct IdeaShard {
    assignments: Vec<Assignment>,
}

impl IdeaShard {
    fn find_mut(&mut self, assignment_id: &AssignmentId) -> StorageResult<&mut Assignment> {
        self.assignments
            .iter_mut()
            .find(|a| a.id == *assignment_id)
            .ok_or_else(|| StorageError::AssignmentNotFound {
                assignment_id: assignment_id.clone(),
            })
    }
}

/// In-memory review store.
#[derive(Debug, Default)]
pub struct MemoryReviewStore {
    policy: CapacityPolicy,
    ideas: Mutex<HashMap<IdeaId, Idea>>,
    judges: Mutex<HashMap<JudgeId, Judge>>,
    shards: Mutex<HashMap<IdeaId, Arc<Mutex<IdeaShard>>>>,
    owners: Mutex<HashMap<AssignmentId, IdeaId>>,
}

impl MemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: CapacityPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    fn shard(&self, idea_id: &IdeaId) -> Arc<Mutex<IdeaShard>> {
        lock_recover(&self.shards)
            .entry(idea_id.clone())
            .or_default()
            .clone()
    }

    fn owning_shard(&self, assignment_id: &AssignmentId) -> StorageResult<Arc<Mutex<IdeaShard>>> {
        let idea_id = lock_recover(&self.owners)
            .get(assignment_id)
            .cloned()
            .ok_or_else(|| StorageError::AssignmentNotFound {
                assignment_id: assignment_id.clone(),
            })?;
        Ok(self.shard(&idea_id))
    }

    /// Run `f` against the assignment while holding its idea's shard.
    fn with_assignment<T>(
        &self,
        assignment_id: &AssignmentId,
        f: impl FnOnce(&mut Assignment) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let shard = self.owning_shard(assignment_id)?;
        let mut shard = lock_recover(&shard);
        let assignment = shard.find_mut(assignment_id)?;
        f(assignment)
    }
}

#[async_trait]
impl Catalog for MemoryReviewStore {
    async fn put_idea(&self, idea: Idea) -> StorageResult<()> {
        lock_recover(&self.ideas).insert(idea.id.clone(), idea);
        Ok(())
    }

    async fn get_idea(&self, idea_id: &IdeaId) -> StorageResult<Idea> {
        lock_recover(&self.ideas)
            .get(idea_id)
            .cloned()
            .ok_or_else(|| StorageError::IdeaNotFound {
                idea_id: idea_id.clone(),
            })
    }

    async fn list_ideas(&self) -> StorageResult<Vec<Idea>> {
        let mut ideas: Vec<Idea> = lock_recover(&self.ideas).values().cloned().collect();
        ideas.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then(a.id.cmp(&b.id)));
        Ok(ideas)
    }

    async fn put_judge(&self, judge: Judge) -> StorageResult<()> {
        lock_recover(&self.judges).insert(judge.id.clone(), judge);
        Ok(())
    }

    async fn get_judge(&self, judge_id: &JudgeId) -> StorageResult<Judge> {
        lock_recover(&self.judges)
            .get(judge_id)
            .cloned()
            .ok_or_else(|| StorageError::JudgeNotFound {
                judge_ids: vec![judge_id.clone()],
            })
    }

    async fn list_judges(&self) -> StorageResult<Vec<Judge>> {
        let mut judges: Vec<Judge> = lock_recover(&self.judges).values().cloned().collect();
        judges.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(judges)
    }
}

#[async_trait]
impl AssignmentStore for MemoryReviewStore {
    fn capacity_policy(&self) -> CapacityPolicy {
        self.policy
    }

    async fn list_for_idea(&self, idea_id: &IdeaId) -> StorageResult<IdeaAssignments> {
        let idea = self.get_idea(idea_id).await?;
        let shard = self.shard(idea_id);
        let assignments = lock_recover(&shard).assignments.clone();
        Ok(IdeaAssignments {
            idea_id: idea_id.clone(),
            assignments,
            max_judges: self.policy.max_judges_for(&idea),
        })
    }

    async fn create(
        &self,
        idea_id: &IdeaId,
        judge_ids: &[JudgeId],
    ) -> StorageResult<Vec<Assignment>> {
        let idea = self.get_idea(idea_id).await?;
        let judge_ids = dedup_judges(judge_ids);
        {
            let judges = lock_recover(&self.judges);
            let unknown: Vec<JudgeId> = judge_ids
                .iter()
                .filter(|id| !judges.contains_key(*id))
                .cloned()
                .collect();
            if !unknown.is_empty() {
                return Err(StorageError::JudgeNotFound { judge_ids: unknown });
            }
        }
        let max_judges = self.policy.max_judges_for(&idea);

        let shard = self.shard(idea_id);
        let mut shard = lock_recover(&shard);

        let duplicates: Vec<JudgeId> = judge_ids
            .iter()
            .filter(|id| shard.assignments.iter().any(|a| a.judge_id == **id))
            .cloned()
            .collect();
        if !duplicates.is_empty() {
            return Err(StorageError::DuplicateAssignment {
                idea_id: idea_id.clone(),
                judge_ids: duplicates,
            });
        }

        let current = shard.assignments.len();
        if !can_assign_batch(current, judge_ids.len(), max_judges) {
            return Err(StorageError::CapacityExceeded {
                idea_id: idea_id.clone(),
                max_judges,
                current,
                requested: judge_ids.len(),
            });
        }

        let now = Utc::now();
        let created: Vec<Assignment> = judge_ids
            .into_iter()
            .map(|judge_id| Assignment::pending(idea_id.clone(), judge_id, now))
            .collect();

        {
            let mut owners = lock_recover(&self.owners);
            for assignment in &created {
                owners.insert(assignment.id.clone(), idea_id.clone());
            }
        }
        shard.assignments.extend(created.iter().cloned());
        debug!(idea_id = %idea_id, count = created.len(), "assignments created");
        Ok(created)
    }

    async fn delete(&self, assignment_id: &AssignmentId) -> StorageResult<()> {
        let shard = self.owning_shard(assignment_id)?;
        let mut shard = lock_recover(&shard);
        if shard.find_mut(assignment_id)?.is_locked() {
            return Err(StorageError::Locked {
                assignment_id: assignment_id.clone(),
            });
        }
        shard.assignments.retain(|a| a.id != *assignment_id);
        lock_recover(&self.owners).remove(assignment_id);
        Ok(())
    }

    async fn lock(&self, assignment_id: &AssignmentId) -> StorageResult<Assignment> {
        self.with_assignment(assignment_id, |assignment| {
            if assignment.locked_at.is_none() {
                assignment.locked_at = Some(Utc::now());
            }
            Ok(assignment.clone())
        })
    }

    async fn get(&self, assignment_id: &AssignmentId) -> StorageResult<Assignment> {
        self.with_assignment(assignment_id, |assignment| Ok(assignment.clone()))
    }

    async fn list_for_judge(&self, judge_id: &JudgeId) -> StorageResult<Vec<Assignment>> {
        let shards: Vec<Arc<Mutex<IdeaShard>>> =
            lock_recover(&self.shards).values().cloned().collect();
        let mut held: Vec<Assignment> = shards
            .iter()
            .flat_map(|shard| {
                lock_recover(shard)
                    .assignments
                    .iter()
                    .filter(|a| a.judge_id == *judge_id)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        held.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.idea_id.cmp(&b.idea_id))
        });
        Ok(held)
    }

    async fn open_evaluation(&self, assignment_id: &AssignmentId) -> StorageResult<Assignment> {
        self.with_assignment(assignment_id, |assignment| {
            if assignment.is_locked() {
                return Err(StorageError::Locked {
                    assignment_id: assignment.id.clone(),
                });
            }
            if assignment.status == AssignmentStatus::Pending {
                assignment.status = AssignmentStatus::InProgress;
            }
            Ok(assignment.clone())
        })
    }

    async fn record_evaluation(
        &self,
        assignment_id: &AssignmentId,
        evaluation: Evaluation,
    ) -> StorageResult<Assignment> {
        self.with_assignment(assignment_id, |assignment| {
            if assignment.is_locked() {
                return Err(StorageError::Locked {
                    assignment_id: assignment.id.clone(),
                });
            }
            assignment.decision_at = Some(evaluation.submitted_at);
            assignment.status = AssignmentStatus::Reviewed;
            assignment.evaluation = Some(evaluation);
            Ok(assignment.clone())
        })
    }
}
