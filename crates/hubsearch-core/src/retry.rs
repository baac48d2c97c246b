//! Timeout and retry budget for backend calls.
//!
//! Every call to an embedding or vector backend goes through a
//! [`RetryPolicy`]: each attempt is bounded by a request timeout, and
//! transient failures ([`Error::is_retryable`]) are retried with a fixed
//! delay until the attempt budget is spent. Anything else fails on the
//! first attempt.

use backon::{ConstantBuilder, Retryable};
use log::warn;
use std::future::Future;
use std::time::Duration;

use crate::{Error, Result};

/// Fixed retry budget: `attempts × delay`, each attempt capped by `timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
    timeout: Duration,
}

impl Default for RetryPolicy {
    /// Default settings:
    /// - Attempts: 3 (first try + 2 retries)
    /// - Delay: 1 second
    /// - Timeout: 10 seconds per attempt
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with explicit settings. `attempts` is clamped to at least 1.
    pub fn new(attempts: u32, delay: Duration, timeout: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
            timeout,
        }
    }

    /// Sets the total number of attempts.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Sets the delay between attempts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total number of attempts.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay between attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `call` under this policy.
    ///
    /// `operation` names the call in timeout errors and retry logs.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout = self.timeout;
        let backoff = ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.attempts.saturating_sub(1) as usize);

        let attempt = || {
            let fut = call();
            async move {
                match tokio::time::timeout(timeout, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::backend_unavailable(
                        operation,
                        format!("timed out after {}ms", timeout.as_millis()),
                    )),
                }
            }
        };

        attempt
            .retry(backoff)
            .when(Error::is_retryable)
            .notify(|err: &Error, after: Duration| {
                warn!("{operation}: retrying in {}ms after: {err}", after.as_millis());
            })
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(10), Duration::from_millis(100))
    }

    #[test]
    fn test_policy_builder() {
        let policy = RetryPolicy::default()
            .with_attempts(5)
            .with_delay(Duration::from_millis(500))
            .with_timeout(Duration::from_secs(30));

        assert_eq!(policy.attempts(), 5);
        assert_eq!(policy.delay(), Duration::from_millis(500));
        assert_eq!(policy.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_attempts_clamped_to_one() {
        assert_eq!(RetryPolicy::default().with_attempts(0).attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(42)
            })
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_exhaust_budget() {
        let calls = AtomicU32::new(0);
        let err = fast_policy(3)
            .run("search", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::backend_unavailable("search", "connection refused"))
            })
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_error() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run("upsert", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Error::backend_unavailable("upsert", "reset"))
                } else {
                    Ok("stored")
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "stored");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_errors_not_retried() {
        let calls = AtomicU32::new(0);
        let err = fast_policy(5)
            .run("store", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::validation("empty id"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_backend_unavailable() {
        let calls = AtomicU32::new(0);
        let err = fast_policy(2)
            .run("ping", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, Error>(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::BackendUnavailable { ref operation, .. } if operation == "ping"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
