//! Judgeflow-State: storage layer for idea/judge assignments
//!
//! This crate owns the persisted records of the review workflow and the
//! invariants that must hold at the moment of writing.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: atomic per-idea writes, lock semantics, closed vocabularies.
//!
//! ## Key Components
//!
//! - `AssignmentStore` / `Catalog`: backend-agnostic storage contracts
//! - `MemoryReviewStore`: in-process implementation
//! - `SurrealReviewStore`: SurrealDB implementation with transactional guards
//! - `CapacityPolicy`: the pure per-idea capacity check
//! - `FileRef`: normalised document references attached to ideas

pub mod capacity;
mod error;
pub mod fakes;
pub mod file_ref;
mod handle;
mod keyed_lock;
pub mod migrations;
pub mod model;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use capacity::{can_assign, can_assign_batch, CapacityPolicy, DEFAULT_MAX_JUDGES};
pub use error::{StateError, StorageError};
pub use fakes::MemoryReviewStore;
pub use file_ref::{FileKind, FileRef};
pub use handle::{CloudConfig, ConnectionSettings, SurrealHandle};
pub use keyed_lock::KeyedLocks;
pub use model::{
    Assignment, AssignmentId, AssignmentStatus, Decision, Evaluation, Idea, IdeaAssignments,
    IdeaId, Judge, JudgeId, LabelError, Ratings, RatingsError, StatusLabel, Submitter,
    RATING_COUNT, RATING_MAX, RATING_MIN,
};
pub use storage_traits::{AssignmentStore, Catalog, ReviewStore, StorageResult};
pub use surreal_store::SurrealReviewStore;

/// Result type for judgeflow-state setup operations
pub type Result<T> = std::result::Result<T, StateError>;
