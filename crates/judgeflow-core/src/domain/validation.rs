//! Validation of judge-supplied evaluation input.

use judgeflow_state::{Decision, Ratings};

use crate::domain::error::{Result, ReviewError};

/// Validate a raw rating vector: exactly ten integers in `[1, 10]`.
pub fn validate_ratings(values: &[i64]) -> Result<Ratings> {
    Ok(Ratings::new(values)?)
}

/// Parse a decision label: exactly `APPROVED` or `REJECTED`.
pub fn validate_decision(value: &str) -> Result<Decision> {
    value.parse().map_err(|_| ReviewError::InvalidDecision {
        value: value.to_string(),
    })
}
