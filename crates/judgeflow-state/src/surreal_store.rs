//! SurrealDB-backed review store
//!
//! Uses `schema::{IdeaRow, JudgeRow, AssignmentRow}` for persistence,
//! converting to and from the model at the boundary.
//!
//! Every assignment mutation runs as one SurrealQL transaction that
//! re-reads the affected rows, aborts with a `THROW "judgeflow:<code>"`
//! when a guard fails and rewrites the idea's tally record. Within one
//! process, mutations on an idea are additionally serialised through
//! [`KeyedLocks`] so callers see deterministic outcomes instead of
//! transaction conflicts.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use surrealdb::engine::any::Any;
use surrealdb::sql::Datetime as SurrealDatetime;
use surrealdb::{Response, Surreal};
use tracing::{debug, instrument};

use crate::capacity::CapacityPolicy;
use crate::error::StorageError;
use crate::handle::SurrealHandle;
use crate::keyed_lock::KeyedLocks;
use crate::model::*;
use crate::schema::{AssignmentRow, EvaluationRow, IdeaRow, JudgeRow};
use crate::storage_traits::*;

const THROW_MARKER: &str = "judgeflow:";

/// Rewrites the tally of `$idea`; included in every assignment transaction.
const TOUCH_TALLY: &str = "UPSERT type::thing('idea_tallies', $idea) SET \
     active = array::len((SELECT assignment_id FROM assignments WHERE idea_id = $idea)), \
     touched_at = time::now();";

const CREATE_TX: &str = r#"
BEGIN TRANSACTION;
LET $existing = (SELECT judge_id FROM assignments WHERE idea_id = $idea);
LET $taken = array::intersect($existing.judge_id, $judges);
IF array::len($taken) > 0 {
    THROW "judgeflow:duplicate";
};
LET $current = array::len($existing);
IF $current + array::len($judges) > $max {
    THROW string::concat("judgeflow:capacity:", <string> $current);
};
FOR $row IN $rows {
    CREATE assignments CONTENT $row;
};
{TOUCH_TALLY}
COMMIT TRANSACTION;
"#;

const GUARD_ROW: &str = r#"
LET $row = (SELECT * FROM assignments WHERE assignment_id = $aid)[0];
IF $row = NONE {
    THROW "judgeflow:not_found";
};
"#;

const GUARD_UNLOCKED: &str = r#"
IF $row.locked = true {
    THROW "judgeflow:locked";
};
"#;

const DELETE_BODY: &str = "DELETE assignments WHERE assignment_id = $aid;";

const LOCK_BODY: &str = r#"
IF $row.locked != true {
    UPDATE assignments SET locked = true, locked_at = $now WHERE assignment_id = $aid;
};
"#;

const OPEN_BODY: &str = r#"
IF $row.status = "PENDING" {
    UPDATE assignments SET status = "IN_PROGRESS" WHERE assignment_id = $aid;
};
"#;

const RECORD_BODY: &str = r#"
UPDATE assignments SET
    status = "REVIEWED",
    evaluation = $evaluation,
    decision_at = $evaluation.submitted_at
WHERE assignment_id = $aid;
"#;

/// Single-assignment write, run between the row guards and the tally.
enum Mutation {
    Delete,
    Lock,
    Open,
    Record(EvaluationRow),
}

impl Mutation {
    fn body(&self) -> &'static str {
        match self {
            Mutation::Delete => DELETE_BODY,
            Mutation::Lock => LOCK_BODY,
            Mutation::Open => OPEN_BODY,
            Mutation::Record(_) => RECORD_BODY,
        }
    }

    /// Lock is idempotent on locked rows; everything else is refused.
    fn requires_unlocked(&self) -> bool {
        !matches!(self, Mutation::Lock)
    }
}

/// Transaction outcome.
enum Aborted {
    /// A guard fired: `(code, detail)` from `judgeflow:<code>[:<detail>]`.
    Thrown(String, String),
    Failed(StorageError),
}

impl From<surrealdb::Error> for Aborted {
    fn from(err: surrealdb::Error) -> Self {
        Aborted::Failed(StorageError::from_surreal(err))
    }
}

/// Inspect every statement result. A thrown guard wins over the generic
/// "transaction cancelled" errors reported for the other statements.
fn finish(mut response: Response) -> Result<(), Aborted> {
    let mut errors: Vec<(usize, surrealdb::Error)> = response.take_errors().into_iter().collect();
    if errors.is_empty() {
        return Ok(());
    }
    errors.sort_by_key(|(index, _)| *index);

    for (_, err) in &errors {
        let message = err.to_string();
        if let Some(pos) = message.find(THROW_MARKER) {
            let thrown = message[pos + THROW_MARKER.len()..]
                .trim_end_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace());
            let (code, detail) = thrown.split_once(':').unwrap_or((thrown, ""));
            return Err(Aborted::Thrown(code.to_string(), detail.to_string()));
        }
    }

    let (_, first) = errors.swap_remove(0);
    Err(Aborted::Failed(StorageError::from_surreal(first)))
}

#[derive(Debug, Deserialize)]
struct JudgeIdRow {
    judge_id: String,
}

/// SurrealDB implementation of [`Catalog`] and [`AssignmentStore`].
pub struct SurrealReviewStore {
    db: Surreal<Any>,
    policy: CapacityPolicy,
    locks: KeyedLocks,
}

impl SurrealReviewStore {
    pub fn new(handle: &SurrealHandle, policy: CapacityPolicy) -> Self {
        Self {
            db: handle.db().clone(),
            policy,
            locks: KeyedLocks::new(),
        }
    }

    /// Requested judges already holding an assignment on `idea_id`, in
    /// request order. Called with the idea lock held.
    async fn taken_judges(
        &self,
        idea_id: &IdeaId,
        judge_ids: &[JudgeId],
    ) -> StorageResult<Vec<JudgeId>> {
        let judges: Vec<String> = judge_ids.iter().map(|j| j.0.clone()).collect();
        let mut res = self
            .db
            .query(
                "SELECT judge_id FROM assignments \
                 WHERE idea_id = $idea AND judge_id IN $judges",
            )
            .bind(("idea", idea_id.0.clone()))
            .bind(("judges", judges))
            .await
            .map_err(StorageError::from_surreal)?;
        let rows: Vec<JudgeIdRow> = res.take(0).map_err(StorageError::from_surreal)?;
        let taken: HashSet<String> = rows.into_iter().map(|r| r.judge_id).collect();
        Ok(judge_ids
            .iter()
            .filter(|j| taken.contains(j.as_str()))
            .cloned()
            .collect())
    }

    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> crate::Result<Self> {
        let handle = SurrealHandle::in_memory().await?;
        Ok(Self::new(&handle, CapacityPolicy::default()))
    }

    pub fn with_policy(mut self, policy: CapacityPolicy) -> Self {
        self.policy = policy;
        self
    }

    // -- private helpers -----------------------------------------------------

    async fn fetch_row(&self, assignment_id: &AssignmentId) -> StorageResult<AssignmentRow> {
        let mut res = self
            .db
            .query("SELECT * FROM assignments WHERE assignment_id = $aid")
            .bind(("aid", assignment_id.0.clone()))
            .await
            .map_err(StorageError::from_surreal)?;

        let rows: Vec<AssignmentRow> = res.take(0).map_err(StorageError::from_surreal)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::AssignmentNotFound {
                assignment_id: assignment_id.clone(),
            })
    }

    async fn fetch(&self, assignment_id: &AssignmentId) -> StorageResult<Assignment> {
        self.fetch_row(assignment_id).await?.into_assignment()
    }

    async fn unknown_judges(&self, judge_ids: &[JudgeId]) -> StorageResult<Vec<JudgeId>> {
        let wanted: Vec<String> = judge_ids.iter().map(|j| j.0.clone()).collect();
        let mut res = self
            .db
            .query("SELECT judge_id FROM judges WHERE judge_id IN $ids")
            .bind(("ids", wanted))
            .await
            .map_err(StorageError::from_surreal)?;
        let found: Vec<JudgeIdRow> = res.take(0).map_err(StorageError::from_surreal)?;
        let found: HashSet<String> = found.into_iter().map(|r| r.judge_id).collect();

        Ok(judge_ids
            .iter()
            .filter(|id| !found.contains(&id.0))
            .cloned()
            .collect())
    }

    /// Run a guarded single-assignment transaction while holding the
    /// owning idea's lock, then return the row as committed.
    async fn mutate(
        &self,
        assignment_id: &AssignmentId,
        mutation: Mutation,
    ) -> StorageResult<Option<Assignment>> {
        let owner = self.fetch_row(assignment_id).await?;
        let _guard = self.locks.acquire(&owner.idea_id).await;

        let unlocked = if mutation.requires_unlocked() {
            GUARD_UNLOCKED
        } else {
            ""
        };
        let sql = format!(
            "BEGIN TRANSACTION;\n{GUARD_ROW}\n{unlocked}\n{}\n{TOUCH_TALLY}\nCOMMIT TRANSACTION;",
            mutation.body()
        );

        let mut query = self
            .db
            .query(sql)
            .bind(("aid", assignment_id.0.clone()))
            .bind(("idea", owner.idea_id.clone()))
            .bind(("now", SurrealDatetime::from(Utc::now())));
        let deletes = matches!(mutation, Mutation::Delete);
        if let Mutation::Record(evaluation) = mutation {
            query = query.bind(("evaluation", evaluation));
        }

        let outcome = match query.await {
            Ok(response) => finish(response),
            Err(err) => Err(Aborted::from(err)),
        };

        match outcome {
            Ok(()) => {}
            Err(Aborted::Thrown(code, _)) if code == "not_found" => {
                return Err(StorageError::AssignmentNotFound {
                    assignment_id: assignment_id.clone(),
                })
            }
            Err(Aborted::Thrown(code, _)) if code == "locked" => {
                return Err(StorageError::Locked {
                    assignment_id: assignment_id.clone(),
                })
            }
            Err(Aborted::Thrown(code, detail)) => {
                return Err(StorageError::Backend(format!(
                    "unexpected guard {code}: {detail}"
                )))
            }
            Err(Aborted::Failed(err)) => return Err(err),
        }

        if deletes {
            return Ok(None);
        }
        self.fetch(assignment_id).await.map(Some)
    }

    async fn mutate_existing(
        &self,
        assignment_id: &AssignmentId,
        mutation: Mutation,
    ) -> StorageResult<Assignment> {
        self.mutate(assignment_id, mutation)
            .await?
            .ok_or_else(|| StorageError::AssignmentNotFound {
                assignment_id: assignment_id.clone(),
            })
    }
}

#[async_trait]
impl Catalog for SurrealReviewStore {
    #[instrument(skip(self, idea), fields(idea_id = %idea.id))]
    async fn put_idea(&self, idea: Idea) -> StorageResult<()> {
        let row = IdeaRow::from(idea);
        let mut res = self
            .db
            .query("UPSERT type::thing('ideas', $id) CONTENT $row")
            .bind(("id", row.idea_id.clone()))
            .bind(("row", row))
            .await
            .map_err(StorageError::from_surreal)?;
        res.take_errors()
            .into_values()
            .next()
            .map_or(Ok(()), |e| Err(StorageError::from_surreal(e)))
    }

    async fn get_idea(&self, idea_id: &IdeaId) -> StorageResult<Idea> {
        let mut res = self
            .db
            .query("SELECT * FROM ideas WHERE idea_id = $id")
            .bind(("id", idea_id.0.clone()))
            .await
            .map_err(StorageError::from_surreal)?;
        let rows: Vec<IdeaRow> = res.take(0).map_err(StorageError::from_surreal)?;
        rows.into_iter()
            .next()
            .map(Idea::from)
            .ok_or_else(|| StorageError::IdeaNotFound {
                idea_id: idea_id.clone(),
            })
    }

    async fn list_ideas(&self) -> StorageResult<Vec<Idea>> {
        let mut res = self
            .db
            .query("SELECT * FROM ideas ORDER BY submitted_at ASC, idea_id ASC")
            .await
            .map_err(StorageError::from_surreal)?;
        let rows: Vec<IdeaRow> = res.take(0).map_err(StorageError::from_surreal)?;
        Ok(rows.into_iter().map(Idea::from).collect())
    }

    #[instrument(skip(self, judge), fields(judge_id = %judge.id))]
    async fn put_judge(&self, judge: Judge) -> StorageResult<()> {
        let row = JudgeRow::from(judge);
        let mut res = self
            .db
            .query("UPSERT type::thing('judges', $id) CONTENT $row")
            .bind(("id", row.judge_id.clone()))
            .bind(("row", row))
            .await
            .map_err(StorageError::from_surreal)?;
        res.take_errors()
            .into_values()
            .next()
            .map_or(Ok(()), |e| Err(StorageError::from_surreal(e)))
    }

    async fn get_judge(&self, judge_id: &JudgeId) -> StorageResult<Judge> {
        let mut res = self
            .db
            .query("SELECT * FROM judges WHERE judge_id = $id")
            .bind(("id", judge_id.0.clone()))
            .await
            .map_err(StorageError::from_surreal)?;
        let rows: Vec<JudgeRow> = res.take(0).map_err(StorageError::from_surreal)?;
        rows.into_iter()
            .next()
            .map(Judge::from)
            .ok_or_else(|| StorageError::JudgeNotFound {
                judge_ids: vec![judge_id.clone()],
            })
    }

    async fn list_judges(&self) -> StorageResult<Vec<Judge>> {
        let mut res = self
            .db
            .query("SELECT * FROM judges ORDER BY judge_id ASC")
            .await
            .map_err(StorageError::from_surreal)?;
        let rows: Vec<JudgeRow> = res.take(0).map_err(StorageError::from_surreal)?;
        Ok(rows.into_iter().map(Judge::from).collect())
    }
}

#[async_trait]
impl AssignmentStore for SurrealReviewStore {
    fn capacity_policy(&self) -> CapacityPolicy {
        self.policy
    }

    #[instrument(skip(self), fields(idea_id = %idea_id))]
    async fn list_for_idea(&self, idea_id: &IdeaId) -> StorageResult<IdeaAssignments> {
        let idea = self.get_idea(idea_id).await?;
        let mut res = self
            .db
            .query(
                "SELECT * FROM assignments WHERE idea_id = $idea \
                 ORDER BY created_at ASC, batch_index ASC",
            )
            .bind(("idea", idea_id.0.clone()))
            .await
            .map_err(StorageError::from_surreal)?;
        let rows: Vec<AssignmentRow> = res.take(0).map_err(StorageError::from_surreal)?;
        let assignments = rows
            .into_iter()
            .map(AssignmentRow::into_assignment)
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(IdeaAssignments {
            idea_id: idea_id.clone(),
            assignments,
            max_judges: self.policy.max_judges_for(&idea),
        })
    }

    #[instrument(skip(self, judge_ids), fields(idea_id = %idea_id, requested = judge_ids.len()))]
    async fn create(
        &self,
        idea_id: &IdeaId,
        judge_ids: &[JudgeId],
    ) -> StorageResult<Vec<Assignment>> {
        let idea = self.get_idea(idea_id).await?;
        let judge_ids = dedup_judges(judge_ids);
        let unknown = self.unknown_judges(&judge_ids).await?;
        if !unknown.is_empty() {
            return Err(StorageError::JudgeNotFound { judge_ids: unknown });
        }
        let max_judges = self.policy.max_judges_for(&idea);

        let _guard = self.locks.acquire(idea_id.as_str()).await;

        let now = Utc::now();
        let created: Vec<Assignment> = judge_ids
            .iter()
            .map(|judge_id| Assignment::pending(idea_id.clone(), judge_id.clone(), now))
            .collect();
        let rows: Vec<AssignmentRow> = created
            .iter()
            .zip(0u32..)
            .map(|(assignment, index)| AssignmentRow::new(assignment, index))
            .collect();
        let judges: Vec<String> = judge_ids.iter().map(|j| j.0.clone()).collect();

        let sql = CREATE_TX.replace("{TOUCH_TALLY}", TOUCH_TALLY);
        let outcome = match self
            .db
            .query(sql)
            .bind(("idea", idea_id.0.clone()))
            .bind(("judges", judges))
            .bind(("max", i64::from(max_judges)))
            .bind(("rows", rows))
            .await
        {
            Ok(response) => finish(response),
            Err(err) => Err(Aborted::from(err)),
        };

        match outcome {
            Ok(()) => {
                debug!(idea_id = %idea_id, count = created.len(), "assignments created");
                Ok(created)
            }
            Err(Aborted::Thrown(code, _)) if code == "duplicate" => {
                Err(StorageError::DuplicateAssignment {
                    idea_id: idea_id.clone(),
                    judge_ids: self.taken_judges(idea_id, &judge_ids).await?,
                })
            }
            Err(Aborted::Thrown(code, detail)) if code == "capacity" => {
                Err(StorageError::CapacityExceeded {
                    idea_id: idea_id.clone(),
                    max_judges,
                    current: detail.trim().parse().unwrap_or_default(),
                    requested: judge_ids.len(),
                })
            }
            Err(Aborted::Thrown(code, detail)) => Err(StorageError::Backend(format!(
                "unexpected guard {code}: {detail}"
            ))),
            Err(Aborted::Failed(err)) => Err(err),
        }
    }

    #[instrument(skip(self), fields(assignment_id = %assignment_id))]
    async fn delete(&self, assignment_id: &AssignmentId) -> StorageResult<()> {
        self.mutate(assignment_id, Mutation::Delete)
            .await
            .map(|_| ())
    }

    #[instrument(skip(self), fields(assignment_id = %assignment_id))]
    async fn lock(&self, assignment_id: &AssignmentId) -> StorageResult<Assignment> {
        self.mutate_existing(assignment_id, Mutation::Lock).await
    }

    async fn get(&self, assignment_id: &AssignmentId) -> StorageResult<Assignment> {
        self.fetch(assignment_id).await
    }

    #[instrument(skip(self), fields(judge_id = %judge_id))]
    async fn list_for_judge(&self, judge_id: &JudgeId) -> StorageResult<Vec<Assignment>> {
        let mut res = self
            .db
            .query(
                "SELECT * FROM assignments WHERE judge_id = $judge \
                 ORDER BY created_at ASC, batch_index ASC",
            )
            .bind(("judge", judge_id.0.clone()))
            .await
            .map_err(StorageError::from_surreal)?;
        let rows: Vec<AssignmentRow> = res.take(0).map_err(StorageError::from_surreal)?;
        rows.into_iter()
            .map(AssignmentRow::into_assignment)
            .collect()
    }

    #[instrument(skip(self), fields(assignment_id = %assignment_id))]
    async fn open_evaluation(&self, assignment_id: &AssignmentId) -> StorageResult<Assignment> {
        self.mutate_existing(assignment_id, Mutation::Open).await
    }

    #[instrument(skip(self, evaluation), fields(assignment_id = %assignment_id))]
    async fn record_evaluation(
        &self,
        assignment_id: &AssignmentId,
        evaluation: Evaluation,
    ) -> StorageResult<Assignment> {
        self.mutate_existing(assignment_id, Mutation::Record(EvaluationRow::from(&evaluation)))
            .await
    }
}
