//! Retry policy for transport calls.
//!
//! Only network failures (timeouts, refused or reset connections) are
//! retried. HTTP error statuses and undecodable bodies are returned as-is.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::TransportError;

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 250;
pub const DEFAULT_BACKOFF_FACTOR: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub initial_delay: Duration,
    /// Each delay is the previous one times this factor.
    pub backoff_factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay_ms: u64, backoff_factor: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            backoff_factor,
        }
    }

    /// Never retry.
    pub fn none() -> Self {
        Self::new(0, 0, 1)
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.saturating_pow(attempt);
        self.initial_delay.saturating_mul(factor)
    }

    pub fn should_retry(error: &TransportError) -> bool {
        matches!(error, TransportError::Network(_))
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the retry budget is spent. Returns the last error in the latter case.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(retries = attempt, "request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if Self::should_retry(&err) && attempt < self.max_retries => {
                    let delay = self.delay_for_attempt(attempt);
                    attempt += 1;
                    warn!(
                        error = %err,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after network error"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(750));
    }

    #[test]
    fn only_network_errors_retry() {
        assert!(RetryPolicy::should_retry(&TransportError::Network("reset".into())));
        assert!(!RetryPolicy::should_retry(&TransportError::Http(500)));
        assert!(!RetryPolicy::should_retry(&TransportError::Decode("eof".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_network_errors_until_budget_spent() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result: Result<(), _> = RetryPolicy::default()
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Network("refused".into()))
            })
            .await;

        assert_eq!(result, Err(TransportError::Network("refused".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1100), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn http_errors_are_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = RetryPolicy::default()
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Http(503))
            })
            .await;

        assert_eq!(result, Err(TransportError::Http(503)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let calls = AtomicU32::new(0);

        let result = RetryPolicy::default()
            .run(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TransportError::Network("timed out".into()))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
