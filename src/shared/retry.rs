//! Retry with exponential backoff
//!
//! Generic retry helper for transient failures (timeouts, 5xx, connection
//! drops). Used for read-style operations only; user-initiated mutations
//! must go through a single-attempt policy so a silent duplicate can never
//! double-consume a one-time credential.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first one).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Cap on the delay between retries.
    pub max_delay: Duration,
    /// Randomize each delay to avoid synchronized retries.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy for operations that must not be repeated implicitly.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before the retry following `attempt` (1-based).
    fn delay_after(&self, attempt: u32) -> Duration {
        let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
        let capped = (self.base_delay.as_millis() as u64)
            .saturating_mul(exp)
            .min(self.max_delay.as_millis() as u64);
        let millis = if self.jitter && capped > 1 {
            rand::thread_rng().gen_range(capped / 2..=capped)
        } else {
            capped
        };
        Duration::from_millis(millis)
    }
}

/// Execute an async operation under the given retry policy.
///
/// The `should_retry` closure decides whether an error is transient
/// (worth another attempt) or permanent (bail immediately).
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: impl Fn(&E) -> bool,
    operation_name: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    for attempt in 1..=policy.max_attempts {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = operation_name, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt == policy.max_attempts || !should_retry(&err) {
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %err,
                        "operation failed permanently"
                    );
                    return Err(err);
                }

                let delay = policy.delay_after(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    unreachable!("loop exits via return")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn no_jitter(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            jitter: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_with_backoff(
            &no_jitter(3),
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err("transient".to_string())
                } else {
                    Ok(n)
                }
            },
            |_| true,
            "test_op",
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn bails_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_with_backoff(
            &no_jitter(3),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("permanent".to_string())
            },
            |_| false,
            "test_op",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn respects_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_with_backoff(
            &no_jitter(4),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("transient".to_string())
            },
            |_| true,
            "test_op",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn delay_grows_and_caps() {
        let policy = no_jitter(5);
        assert_eq!(policy.delay_after(1), Duration::from_millis(10));
        assert_eq!(policy.delay_after(2), Duration::from_millis(20));
        assert_eq!(policy.delay_after(3), Duration::from_millis(40));
        assert_eq!(policy.delay_after(6), Duration::from_millis(100));
    }

    #[test]
    fn single_attempt_policy() {
        assert_eq!(RetryPolicy::single_attempt().max_attempts, 1);
    }
}
