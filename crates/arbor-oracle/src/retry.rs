//! Bounded retry with fixed backoff
//!
//! Transient failures are retried up to `max_retries` times. Invalid
//! responses get a single extra attempt and are then surfaced as-is.

use crate::error::OracleError;
use std::future::Future;
use std::time::Duration;

/// Retry policy for oracle calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
}

impl RetryPolicy {
    #[inline]
    #[must_use]
    pub const fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Single attempt, no retries
    #[inline]
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    #[inline]
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[inline]
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    #[inline]
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Run `op` under this policy
    ///
    /// # Errors
    /// - [`OracleError::RetriesExhausted`] when transient failures outlast the budget
    /// - [`OracleError::Invalid`] after the single retry of an invalid response
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, OracleError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OracleError>>,
    {
        let mut attempt = 0u32;
        let mut invalid_retried = false;
        loop {
            attempt += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let budget_left = attempt < self.max_attempts();
            let retry = if err.is_transient() {
                budget_left
            } else if err.is_invalid() && !invalid_retried {
                invalid_retried = true;
                budget_left
            } else {
                false
            };

            if !retry {
                if err.is_transient() && attempt > 1 {
                    tracing::error!(%label, attempt, "oracle retries exhausted: {err}");
                    return Err(OracleError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
                return Err(err);
            }

            tracing::warn!(%label, attempt, "oracle call failed, retrying: {err}");
            if !self.backoff.is_zero() {
                tokio::time::sleep(self.backoff).await;
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidOracleResponse;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy(retries: u32) -> RetryPolicy {
        RetryPolicy::new(retries, Duration::ZERO)
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = policy(3)
            .run("t", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(OracleError::Transport("flaky".into()))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_with_bounded_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy(2)
            .run("t", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(OracleError::Format("bad".into()))
            })
            .await;
        assert!(matches!(
            result,
            Err(OracleError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn invalid_response_is_retried_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy(5)
            .run("t", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(InvalidOracleResponse::IndexOutOfRange { index: 9, len: 2 }.into())
            })
            .await;
        assert!(matches!(result, Err(OracleError::Invalid(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_retry_policy_returns_first_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::none()
            .run("t", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(OracleError::Transport("down".into()))
            })
            .await;
        assert!(matches!(result, Err(OracleError::Transport(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_pauses_between_attempts() {
        let starts = Mutex::new(Vec::new());
        let began = Instant::now();
        let result = RetryPolicy::new(2, Duration::from_millis(500))
            .run("t", || async {
                let mut starts = starts.lock();
                starts.push(Instant::now());
                if starts.len() < 3 {
                    Err(OracleError::Transport("flaky".into()))
                } else {
                    Ok(())
                }
            })
            .await;
        assert!(result.is_ok());

        let starts = starts.into_inner();
        assert_eq!(starts.len(), 3);
        assert_eq!(starts[0], began);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn no_pause_after_final_failure() {
        let began = Instant::now();
        let result: Result<(), _> = RetryPolicy::new(1, Duration::from_secs(2))
            .run("t", || async { Err(OracleError::Transport("down".into())) })
            .await;
        assert!(matches!(
            result,
            Err(OracleError::RetriesExhausted { attempts: 2, .. })
        ));
        let elapsed = began.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(4));
    }
}
