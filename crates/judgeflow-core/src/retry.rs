//! Bounded retry with exponential backoff for read paths.
//!
//! Only listings go through [`with_read_retry`]. Writes surface transient
//! failures to the caller so a batch create is never applied twice.

use std::future::Future;
use std::time::Duration;

use judgeflow_state::StorageResult;
use serde::{Deserialize, Serialize};

use crate::metrics::METRICS;
use crate::obs;

/// `[retry]` section of the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based): doubles each time,
    /// capped at `max_delay_ms`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// Run a read, repeating it while it fails with a transient storage error.
pub async fn with_read_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut read: F,
) -> StorageResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<T>>,
{
    let mut attempt = 1;
    loop {
        match read().await {
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                obs::emit_storage_retry(operation, attempt, delay.as_millis() as u64, &err);
                METRICS.inc_read_retries();
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use judgeflow_state::StorageError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 50,
            max_delay_ms: 300,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(50));
        assert_eq!(policy.delay_for(2), Duration::from_millis(100));
        assert_eq!(policy.delay_for(3), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(300));
        assert_eq!(policy.delay_for(80), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out = with_read_retry(&RetryPolicy::default(), "test.read", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StorageError::Conflict("busy".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out: StorageResult<()> = with_read_retry(&RetryPolicy::default(), "test.read", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Unavailable("down".into()))
        })
        .await;
        assert!(matches!(out, Err(StorageError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out: StorageResult<()> = with_read_retry(&RetryPolicy::default(), "test.read", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Backend("syntax".into()))
        })
        .await;
        assert!(matches!(out, Err(StorageError::Backend(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
