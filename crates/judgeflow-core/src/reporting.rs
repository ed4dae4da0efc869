//! Read-only admin reports: judge roster and per-idea scoreboard.
//!
//! Both are derived from stored assignments on demand and are never
//! persisted. Judge capacity shown in the roster is advisory; nothing in
//! the assignment path enforces it.

use std::sync::Arc;

use judgeflow_state::{Decision, IdeaId, Judge, ReviewStore};
use serde::{Deserialize, Serialize};

use crate::access::Caller;
use crate::domain::{Result, ReviewError};
use crate::obs;
use crate::retry::{with_read_retry, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub judge: Judge,
    /// Assignments neither reviewed nor locked.
    pub open_assignments: usize,
    pub total_assignments: usize,
}

impl RosterEntry {
    /// Whether the judge can take another assignment under their own
    /// capacity. Judges without a capacity always have headroom.
    pub fn has_headroom(&self) -> bool {
        match self.judge.capacity {
            Some(capacity) => self.open_assignments < capacity as usize,
            None => true,
        }
    }
}

/// Aggregate of the evaluations on one idea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scoreboard {
    pub idea_id: IdeaId,
    /// Final scores of reviewed assignments, in assignment order.
    pub scores: Vec<u32>,
    pub mean: Option<f64>,
    pub approvals: usize,
    pub rejections: usize,
    pub reviewed: usize,
    pub assigned: usize,
    pub max_judges: u32,
}

pub struct ReportApi<S: ?Sized> {
    store: Arc<S>,
    retry: RetryPolicy,
}

impl<S> ReportApi<S>
where
    S: ReviewStore + ?Sized,
{
    pub fn new(store: Arc<S>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Every judge with their assignment load.
    pub async fn roster(&self, caller: &Caller) -> Result<Vec<RosterEntry>> {
        let outcome = async {
            caller.require_admin()?;
            let judges =
                with_read_retry(&self.retry, "roster.judges", || self.store.list_judges()).await?;
            let mut roster = Vec::with_capacity(judges.len());
            for judge in judges {
                let held = with_read_retry(&self.retry, "roster.assignments", || {
                    self.store.list_for_judge(&judge.id)
                })
                .await?;
                roster.push(RosterEntry {
                    open_assignments: held.iter().filter(|a| a.is_open()).count(),
                    total_assignments: held.len(),
                    judge,
                });
            }
            Ok::<_, ReviewError>(roster)
        }
        .await;
        outcome.map_err(|e| obs::track_failure("roster.list", caller, e))
    }

    pub async fn scoreboard(&self, caller: &Caller, idea_id: &IdeaId) -> Result<Scoreboard> {
        let outcome = async {
            caller.require_admin()?;
            let listed = with_read_retry(&self.retry, "scoreboard", || {
                self.store.list_for_idea(idea_id)
            })
            .await?;

            let mut board = Scoreboard {
                idea_id: listed.idea_id,
                scores: Vec::new(),
                mean: None,
                approvals: 0,
                rejections: 0,
                reviewed: 0,
                assigned: listed.assignments.len(),
                max_judges: listed.max_judges,
            };
            for assignment in &listed.assignments {
                let Some(evaluation) = &assignment.evaluation else {
                    continue;
                };
                if !assignment.status.is_reviewed() {
                    continue;
                }
                board.reviewed += 1;
                board.scores.push(evaluation.final_score);
                match evaluation.decision {
                    Decision::Approved => board.approvals += 1,
                    Decision::Rejected => board.rejections += 1,
                }
            }
            if !board.scores.is_empty() {
                let sum: u32 = board.scores.iter().sum();
                board.mean = Some(f64::from(sum) / board.scores.len() as f64);
            }
            Ok::<_, ReviewError>(board)
        }
        .await;
        outcome.map_err(|e| obs::track_failure("scoreboard", caller, e))
    }
}
