//! Global atomic counters for Judgeflow.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (the CLI does so on exit).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters.
pub struct Metrics {
    assignments_created: AtomicU64,
    assignments_deleted: AtomicU64,
    assignments_locked: AtomicU64,
    evaluations_submitted: AtomicU64,
    requests_rejected: AtomicU64,
    read_retries: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            assignments_created: AtomicU64::new(0),
            assignments_deleted: AtomicU64::new(0),
            assignments_locked: AtomicU64::new(0),
            evaluations_submitted: AtomicU64::new(0),
            requests_rejected: AtomicU64::new(0),
            read_retries: AtomicU64::new(0),
        }
    }

    /// Add `n` newly created assignments.
    pub fn add_assignments_created(&self, n: u64) {
        self.assignments_created.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "assignments_created", "counter incremented");
    }

    pub fn inc_assignments_deleted(&self) {
        self.assignments_deleted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "assignments_deleted", "counter incremented");
    }

    pub fn inc_assignments_locked(&self) {
        self.assignments_locked.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "assignments_locked", "counter incremented");
    }

    pub fn inc_evaluations_submitted(&self) {
        self.evaluations_submitted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "evaluations_submitted", "counter incremented");
    }

    /// A caller-correctable refusal (capacity, duplicate, lock, validation).
    pub fn inc_requests_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "requests_rejected", "counter incremented");
    }

    pub fn inc_read_retries(&self) {
        self.read_retries.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "read_retries", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            assignments_created = self.assignments_created(),
            assignments_deleted = self.assignments_deleted(),
            assignments_locked = self.assignments_locked(),
            evaluations_submitted = self.evaluations_submitted(),
            requests_rejected = self.requests_rejected(),
            read_retries = self.read_retries(),
        );
    }

    pub fn assignments_created(&self) -> u64 {
        self.assignments_created.load(Ordering::Relaxed)
    }

    pub fn assignments_deleted(&self) -> u64 {
        self.assignments_deleted.load(Ordering::Relaxed)
    }

    pub fn assignments_locked(&self) -> u64 {
        self.assignments_locked.load(Ordering::Relaxed)
    }

    pub fn evaluations_submitted(&self) -> u64 {
        self.evaluations_submitted.load(Ordering::Relaxed)
    }

    pub fn requests_rejected(&self) -> u64 {
        self.requests_rejected.load(Ordering::Relaxed)
    }

    pub fn read_retries(&self) -> u64 {
        self.read_retries.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.assignments_created.store(0, Ordering::Relaxed);
        self.assignments_deleted.store(0, Ordering::Relaxed);
        self.assignments_locked.store(0, Ordering::Relaxed);
        self.evaluations_submitted.store(0, Ordering::Relaxed);
        self.requests_rejected.store(0, Ordering::Relaxed);
        self.read_retries.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.add_assignments_created(2);
        m.add_assignments_created(1);
        assert_eq!(m.assignments_created(), 3);

        m.inc_assignments_locked();
        m.inc_evaluations_submitted();
        m.inc_evaluations_submitted();
        assert_eq!(m.assignments_locked(), 1);
        assert_eq!(m.evaluations_submitted(), 2);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.add_assignments_created(4);
        m.inc_assignments_deleted();
        m.inc_requests_rejected();
        m.inc_read_retries();
        m.reset();
        assert_eq!(m.assignments_created(), 0);
        assert_eq!(m.assignments_deleted(), 0);
        assert_eq!(m.requests_rejected(), 0);
        assert_eq!(m.read_retries(), 0);
    }
}
