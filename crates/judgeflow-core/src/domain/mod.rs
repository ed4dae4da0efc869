//! Domain types and rules shared by the Judgeflow APIs.

pub mod error;
pub mod validation;

pub use error::{Entity, ErrorKind, ErrorReport, Result, ReviewError};
pub use validation::{validate_decision, validate_ratings};
