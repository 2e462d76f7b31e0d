//! Retry utilities with exponential backoff.
//!
//! Calls to the generation and synthesis services are wrapped here so that
//! timeouts, rate limiting and 5xx responses do not fail a job outright.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use reel_services::ServiceError;

/// Backoff policy for one kind of service call.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further one
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Label for log lines, e.g. `video_poll`
    pub operation: &'static str,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            operation: "service_call",
        }
    }
}

impl RetryConfig {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Same backoff policy under a different operation label.
    pub fn named(&self, operation: &'static str) -> Self {
        Self {
            operation,
            ..self.clone()
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Errors that say whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for ServiceError {
    fn is_retryable(&self) -> bool {
        ServiceError::is_retryable(self)
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// runs out of retries. The last error is returned.
///
/// ```ignore
/// let config = RetryConfig::new("video_submit").with_max_retries(3);
/// let handle = retry_async(&config, || generator.submit(&request)).await?;
/// ```
pub async fn retry_async<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                let delay = config.delay_for_attempt(attempt);
                debug!(
                    operation = config.operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after error: {}", e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if attempt > 0 {
                    warn!(
                        operation = config.operation,
                        attempts = attempt + 1,
                        "Giving up: {}", e
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Consecutive-failure counter for a repeating background operation.
///
/// Tolerates up to `limit` failures in a row. Only the first `max_logged`
/// of a streak are worth logging; the rest are counted silently until the
/// next success.
#[derive(Debug)]
pub struct FailureTracker {
    operation: &'static str,
    limit: u32,
    max_logged: u32,
    streak: u32,
}

impl FailureTracker {
    pub fn new(operation: &'static str, limit: u32, max_logged: u32) -> Self {
        Self {
            operation,
            limit,
            max_logged,
            streak: 0,
        }
    }

    /// A success ends the current streak.
    pub fn record_success(&mut self) {
        if self.streak > self.max_logged {
            debug!(
                operation = self.operation,
                failures = self.streak,
                "Recovered after suppressed failures"
            );
        }
        self.streak = 0;
    }

    /// Returns `true` if this failure should be logged.
    pub fn record_failure(&mut self) -> bool {
        self.streak += 1;
        if self.streak == self.max_logged + 1 {
            warn!(
                operation = self.operation,
                "Suppressing further failure logs after {} in a row", self.max_logged
            );
        }
        self.streak <= self.max_logged
    }

    /// The streak has used up its tolerance.
    pub fn exhausted(&self) -> bool {
        self.streak >= self.limit
    }

    pub fn failure_count(&self) -> u32 {
        self.streak
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(name: &'static str) -> RetryConfig {
        RetryConfig::new(name)
            .with_max_retries(3)
            .with_base_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, ServiceError> = retry_async(&fast("submit"), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(ServiceError::RateLimited)
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), ServiceError> = retry_async(&fast("submit"), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError::Http {
                status: 400,
                body: "bad prompt".to_string(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<(), ServiceError> = retry_async(&fast("poll"), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError::Http {
                status: 503,
                body: String::new(),
            })
        })
        .await;

        assert!(matches!(result, Err(ServiceError::Http { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = RetryConfig::new("x").with_base_delay(Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(10));
    }

    #[test]
    fn test_failure_tracker_suppression() {
        let mut tracker = FailureTracker::new("poll", 5, 2);
        assert!(tracker.record_failure());
        assert!(tracker.record_failure());
        assert!(!tracker.record_failure());
        assert!(!tracker.record_failure());
        assert_eq!(tracker.failure_count(), 4);
        assert!(!tracker.exhausted());
        tracker.record_failure();
        assert!(tracker.exhausted());

        tracker.record_success();
        assert_eq!(tracker.failure_count(), 0);
        assert!(!tracker.exhausted());
        assert!(tracker.record_failure());
    }
}
