//! Structured observability hooks for assignment lifecycle events.
//!
//! One `info!` event per state transition, each with a stable `event`
//! field. Refusals and retries are emitted at `warn!`.

use judgeflow_state::{Assignment, AssignmentId, IdeaId};
use tracing::{info, warn};

use crate::access::Caller;
use crate::domain::ReviewError;
use crate::metrics::METRICS;

/// Span tagging work on one idea. Async code attaches it with
/// `tracing::Instrument`; sync callers use [`AssignmentSpan`].
pub fn idea_span(idea_id: &IdeaId) -> tracing::Span {
    tracing::info_span!("judgeflow.idea", idea_id = %idea_id)
}

/// RAII guard that scopes logs to one idea.
///
/// ```ignore
/// let _span = AssignmentSpan::enter(&idea_id);
/// // tracing calls now carry idea_id
/// ```
pub struct AssignmentSpan {
    _span: tracing::span::EnteredSpan,
}

impl AssignmentSpan {
    pub fn enter(idea_id: &IdeaId) -> Self {
        Self {
            _span: idea_span(idea_id).entered(),
        }
    }
}

pub fn emit_assignments_created(idea_id: &IdeaId, created: &[Assignment]) {
    let judges: Vec<&str> = created.iter().map(|a| a.judge_id.as_str()).collect();
    info!(
        event = "assignment.created",
        idea_id = %idea_id,
        count = created.len(),
        judges = ?judges,
    );
}

pub fn emit_assignment_deleted(assignment_id: &AssignmentId) {
    info!(event = "assignment.deleted", assignment_id = %assignment_id);
}

pub fn emit_assignment_locked(assignment: &Assignment) {
    info!(
        event = "assignment.locked",
        assignment_id = %assignment.id,
        idea_id = %assignment.idea_id,
        status = %assignment.status,
    );
}

pub fn emit_evaluation_opened(assignment: &Assignment) {
    info!(
        event = "evaluation.opened",
        assignment_id = %assignment.id,
        judge_id = %assignment.judge_id,
        status = %assignment.status,
    );
}

pub fn emit_evaluation_submitted(assignment: &Assignment) {
    let (final_score, decision) = assignment
        .evaluation
        .as_ref()
        .map(|e| (e.final_score, e.decision.as_str()))
        .unwrap_or((0, ""));
    info!(
        event = "evaluation.submitted",
        assignment_id = %assignment.id,
        judge_id = %assignment.judge_id,
        final_score = final_score,
        decision = decision,
    );
}

/// A caller-correctable refusal of an operation.
pub fn emit_request_rejected(operation: &str, caller: &Caller, error: &ReviewError) {
    let actor = match caller {
        Caller::Admin => "admin",
        Caller::Judge(judge_id) => judge_id.as_str(),
        Caller::Anonymous => "anonymous",
    };
    warn!(
        event = "assignment.rejected",
        operation = operation,
        actor = actor,
        kind = %error.kind(),
        reason = %error,
    );
}

/// Log and count refusals; storage and config failures pass through.
pub(crate) fn track_failure(operation: &str, caller: &Caller, error: ReviewError) -> ReviewError {
    if !matches!(error, ReviewError::Storage(_) | ReviewError::Config(_)) {
        emit_request_rejected(operation, caller, &error);
        METRICS.inc_requests_rejected();
    }
    error
}

/// A transient read failure about to be retried.
pub fn emit_storage_retry(operation: &str, attempt: u32, delay_ms: u64, error: &dyn std::fmt::Display) {
    warn!(
        event = "storage.retry",
        operation = operation,
        attempt = attempt,
        delay_ms = delay_ms,
        error = %error,
    );
}
