//! Row definitions for Judgeflow SurrealDB tables
//!
//! Tables:
//! - ideas: catalog of submitted ideas
//! - judges: catalog of evaluators
//! - assignments: judge/idea bindings with embedded evaluation
//!
//! Rows convert to and from the `model` types at the store boundary;
//! persisted labels are parsed back into closed enums there.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::file_ref::FileRef;
use crate::model::*;

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Module for serializing optional chrono DateTime to SurrealDB datetime format
mod surreal_datetime_opt {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => {
                let sd = SurrealDatetime::from(*d);
                serde::Serialize::serialize(&Some(sd), serializer)
            }
            None => serde::Serialize::serialize(&None::<SurrealDatetime>, serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = Option::<SurrealDatetime>::deserialize(deserializer)?;
        Ok(sd.map(DateTime::from))
    }
}

fn corrupt(what: &str, id: &str, err: impl std::fmt::Display) -> StorageError {
    StorageError::Corrupt(format!("{what} {id}: {err}"))
}

// ---------------------------------------------------------------------------
// ideas / judges
// ---------------------------------------------------------------------------

/// Row in the `ideas` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdeaRow {
    pub idea_id: String,
    pub title: String,
    pub track: String,
    pub submitter_name: String,
    pub submitter_email: Option<String>,
    #[serde(with = "surreal_datetime")]
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub files: Vec<FileRef>,
    pub max_judges: Option<u32>,
}

impl From<Idea> for IdeaRow {
    fn from(idea: Idea) -> Self {
        Self {
            idea_id: idea.id.0,
            title: idea.title,
            track: idea.track,
            submitter_name: idea.submitter.name,
            submitter_email: idea.submitter.email,
            submitted_at: idea.submitted_at,
            files: idea.files,
            max_judges: idea.max_judges,
        }
    }
}

impl From<IdeaRow> for Idea {
    fn from(row: IdeaRow) -> Self {
        Idea {
            id: IdeaId(row.idea_id),
            title: row.title,
            track: row.track,
            submitter: Submitter {
                name: row.submitter_name,
                email: row.submitter_email,
            },
            submitted_at: row.submitted_at,
            files: row.files,
            max_judges: row.max_judges,
        }
    }
}

/// Row in the `judges` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeRow {
    pub judge_id: String,
    pub display_name: String,
    pub credential_ref: Option<String>,
    pub capacity: Option<u32>,
}

impl From<Judge> for JudgeRow {
    fn from(judge: Judge) -> Self {
        Self {
            judge_id: judge.id.0,
            display_name: judge.display_name,
            credential_ref: judge.credential_ref,
            capacity: judge.capacity,
        }
    }
}

impl From<JudgeRow> for Judge {
    fn from(row: JudgeRow) -> Self {
        Judge {
            id: JudgeId(row.judge_id),
            display_name: row.display_name,
            credential_ref: row.credential_ref,
            capacity: row.capacity,
        }
    }
}

// ---------------------------------------------------------------------------
// assignments
// ---------------------------------------------------------------------------

/// Embedded evaluation object on an assignment row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub ratings: Vec<i64>,
    pub decision: String,
    #[serde(with = "surreal_datetime")]
    pub submitted_at: DateTime<Utc>,
    pub final_score: u32,
}

impl From<&Evaluation> for EvaluationRow {
    fn from(evaluation: &Evaluation) -> Self {
        Self {
            ratings: evaluation.ratings.into(),
            decision: evaluation.decision.as_str().to_string(),
            submitted_at: evaluation.submitted_at,
            final_score: evaluation.final_score,
        }
    }
}

/// Row in the `assignments` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRow {
    pub assignment_id: String,
    pub idea_id: String,
    pub judge_id: String,
    pub status: String,
    /// Position inside the creating batch; orders rows sharing `created_at`.
    pub batch_index: u32,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    pub locked: bool,
    #[serde(with = "surreal_datetime_opt", default)]
    pub locked_at: Option<DateTime<Utc>>,
    #[serde(with = "surreal_datetime_opt", default)]
    pub decision_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub evaluation: Option<EvaluationRow>,
}

impl AssignmentRow {
    pub fn new(assignment: &Assignment, batch_index: u32) -> Self {
        Self {
            assignment_id: assignment.id.0.clone(),
            idea_id: assignment.idea_id.0.clone(),
            judge_id: assignment.judge_id.0.clone(),
            status: assignment.status.as_str().to_string(),
            batch_index,
            created_at: assignment.created_at,
            locked: assignment.is_locked(),
            locked_at: assignment.locked_at,
            decision_at: assignment.decision_at,
            evaluation: assignment.evaluation.as_ref().map(EvaluationRow::from),
        }
    }

    /// Map the row back into the model, rejecting unknown labels.
    pub fn into_assignment(self) -> Result<Assignment, StorageError> {
        let id = self.assignment_id;
        let status = AssignmentStatus::from_str(&self.status)
            .map_err(|e| corrupt("assignment", &id, e))?;

        let evaluation = match self.evaluation {
            Some(row) => {
                let ratings = Ratings::new(&row.ratings).map_err(|e| corrupt("assignment", &id, e))?;
                let decision =
                    Decision::from_str(&row.decision).map_err(|e| corrupt("assignment", &id, e))?;
                Some(Evaluation::new(ratings, decision, row.submitted_at))
            }
            None => None,
        };

        // `locked` is authoritative; `locked_at` only carries the timestamp.
        let locked_at = match (self.locked, self.locked_at) {
            (true, Some(at)) => Some(at),
            (true, None) => Some(self.created_at),
            (false, _) => None,
        };

        Ok(Assignment {
            id: AssignmentId(id),
            idea_id: IdeaId(self.idea_id),
            judge_id: JudgeId(self.judge_id),
            status,
            created_at: self.created_at,
            locked_at,
            decision_at: self.decision_at,
            evaluation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_is_corrupt() {
        let assignment = Assignment::pending(IdeaId::from("i"), JudgeId::from("j"), Utc::now());
        let mut row = AssignmentRow::new(&assignment, 0);
        row.status = "ARCHIVED".to_string();
        assert!(matches!(
            row.into_assignment(),
            Err(StorageError::Corrupt(_))
        ));
    }

    #[test]
    fn evaluation_survives_row_mapping() {
        let mut assignment =
            Assignment::pending(IdeaId::from("i"), JudgeId::from("j"), Utc::now());
        let ratings = Ratings::new(&[8, 7, 9, 6, 10, 5, 8, 7, 9, 6]).unwrap();
        assignment.evaluation = Some(Evaluation::new(ratings, Decision::Approved, Utc::now()));
        assignment.status = AssignmentStatus::Reviewed;

        let back = AssignmentRow::new(&assignment, 3).into_assignment().unwrap();
        assert_eq!(back, assignment);
        assert_eq!(back.evaluation.unwrap().final_score, 75);
    }
}
