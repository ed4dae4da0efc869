//! Judgeflow Core Library
//!
//! Assignment administration, evaluation, judge desk, reports and document
//! access on top of the `judgeflow-state` storage contracts.

pub mod access;
pub mod assignments;
pub mod config;
pub mod desk;
pub mod domain;
pub mod evaluation;
pub mod file_gateway;
pub mod metrics;
pub mod obs;
pub mod reporting;
pub mod retry;
pub mod telemetry;

pub use access::{AccessGuard, Caller, TokenAccessGuard};
pub use assignments::AssignmentApi;
pub use config::{AccessConfig, CapacityConfig, FilesConfig, JudgeflowConfig};
pub use desk::{DeskApi, DeskEntry, DeskStats, IdeaSummary, JudgeDesk};
pub use domain::{Entity, ErrorKind, ErrorReport, Result, ReviewError};
pub use evaluation::EvaluationEngine;
pub use file_gateway::{
    gateway_from_config, DocumentLinker, FileApi, FileGateway, FileResolution, LocalFileGateway,
    RedirectFileGateway,
};
pub use metrics::METRICS;
pub use obs::AssignmentSpan;
pub use reporting::{ReportApi, RosterEntry, Scoreboard};
pub use retry::{with_read_retry, RetryPolicy};
pub use telemetry::init_tracing;

pub use judgeflow_state::{
    Assignment, AssignmentId, AssignmentStatus, Decision, Evaluation, FileRef, Idea,
    IdeaAssignments, IdeaId, Judge, JudgeId, ReviewStore, StatusLabel, Submitter,
};
