//! SurrealDB schema migrations and initialization
//!
//! Sets up the catalog tables, the assignment table with its uniqueness
//! constraint, and the per-idea tally records that every assignment
//! transaction writes.

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StateError;
use crate::Result;

/// Initialize all Judgeflow tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing Judgeflow SurrealDB schema");

    init_catalog_tables(db).await?;
    init_assignments_table(db).await?;
    init_idea_tallies_table(db).await?;

    info!("Judgeflow schema initialization complete");
    Ok(())
}

async fn run(db: &Surreal<Any>, table: &str, sql: &str) -> Result<()> {
    let mut response = db
        .query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(format!("{table}: {e}")))?;
    let errors = response.take_errors();
    if let Some(err) = errors.into_values().next() {
        return Err(StateError::SchemaSetup(format!("{table}: {err}")));
    }
    Ok(())
}

/// Initialize `ideas` and `judges`
///
/// Schema:
/// ```text
/// TABLE ideas  { idea_id: STRING (unique), title, track, submitter_*, submitted_at, files, max_judges? }
/// TABLE judges { judge_id: STRING (unique), display_name, credential_ref?, capacity? }
/// ```
async fn init_catalog_tables(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing catalog tables");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS ideas SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_idea_id ON TABLE ideas COLUMNS idea_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_idea_submitted_at ON TABLE ideas COLUMNS submitted_at;

        DEFINE TABLE IF NOT EXISTS judges SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_judge_id ON TABLE judges COLUMNS judge_id UNIQUE;
    "#;

    run(db, "catalog", sql).await?;
    info!("✓ catalog tables initialized");
    Ok(())
}

/// Initialize `assignments`
///
/// Schema:
/// ```text
/// TABLE assignments {
///   assignment_id: STRING (unique)
///   idea_id:       STRING (indexed)
///   judge_id:      STRING (indexed)
///   status:        STRING (PENDING | IN_PROGRESS | SUBMITTED | REVIEWED)
///   batch_index:   INT
///   created_at:    DATETIME
///   locked:        BOOL
///   locked_at:     DATETIME?
///   decision_at:   DATETIME?
///   evaluation:    OBJECT?
/// }
/// ```
///
/// Constraints:
/// - `(idea_id, judge_id)` is unique
/// - capacity and the lock flag are enforced inside the write transactions
async fn init_assignments_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing assignments table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS assignments SCHEMALESS;

        DEFINE INDEX IF NOT EXISTS idx_assignment_id ON TABLE assignments COLUMNS assignment_id UNIQUE;

        -- One assignment per (idea, judge)
        DEFINE INDEX IF NOT EXISTS idx_idea_judge ON TABLE assignments COLUMNS idea_id, judge_id UNIQUE;

        DEFINE INDEX IF NOT EXISTS idx_assignment_idea ON TABLE assignments COLUMNS idea_id;
        DEFINE INDEX IF NOT EXISTS idx_assignment_judge ON TABLE assignments COLUMNS judge_id;
    "#;

    run(db, "assignments", sql).await?;
    info!("✓ assignments table initialized");
    Ok(())
}

/// Initialize `idea_tallies`
///
/// One record per idea, keyed `idea_tallies:<idea_id>`, rewritten by every
/// assignment mutation on that idea. Two transactions on the same idea
/// therefore always write a common record and cannot both commit.
async fn init_idea_tallies_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing idea_tallies table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS idea_tallies SCHEMALESS;
    "#;

    run(db, "idea_tallies", sql).await?;
    info!("✓ idea_tallies table initialized");
    Ok(())
}
