//! Capacity policy: how many judges an idea may carry at once.
//!
//! Pure functions only. Stores evaluate the policy inside the same critical
//! section as the insert it guards.

use serde::{Deserialize, Serialize};

use crate::model::Idea;

/// System-wide `max_judges` applied to ideas without an override.
pub const DEFAULT_MAX_JUDGES: u32 = 3;

/// Whether one more assignment may be created for an idea that currently
/// carries `current` assignments.
pub fn can_assign(current: usize, max_judges: u32) -> bool {
    current < max_judges as usize
}

/// Whether a batch of `requested` assignments fits as a whole.
///
/// Every insert of the batch is checked against the count it would see,
/// so the batch is admitted only if the post-batch count stays within
/// `max_judges`.
pub fn can_assign_batch(current: usize, requested: usize, max_judges: u32) -> bool {
    (0..requested).all(|offset| can_assign(current + offset, max_judges))
}

/// Capacity configuration shared by all store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityPolicy {
    pub default_max_judges: u32,
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self {
            default_max_judges: DEFAULT_MAX_JUDGES,
        }
    }
}

impl CapacityPolicy {
    pub fn new(default_max_judges: u32) -> Self {
        Self { default_max_judges }
    }

    /// Effective capacity for an idea.
    pub fn max_judges_for(&self, idea: &Idea) -> u32 {
        idea.max_judges.unwrap_or(self.default_max_judges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_at_capacity() {
        assert!(can_assign(0, 2));
        assert!(can_assign(1, 2));
        assert!(!can_assign(2, 2));
        assert!(!can_assign(5, 2));
    }

    #[test]
    fn zero_capacity_admits_nothing() {
        assert!(!can_assign(0, 0));
        assert!(!can_assign_batch(0, 1, 0));
    }

    #[test]
    fn batch_checks_post_batch_count() {
        assert!(can_assign_batch(0, 2, 2));
        assert!(!can_assign_batch(0, 3, 2));
        assert!(!can_assign_batch(1, 2, 2));
        assert!(can_assign_batch(1, 1, 2));
    }

    #[test]
    fn empty_batch_always_fits() {
        assert!(can_assign_batch(2, 0, 2));
    }
}
