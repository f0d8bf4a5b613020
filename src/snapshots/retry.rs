use crate::snapshots::transport::FetchError;
use log::warn;
use std::future::Future;
use std::time::Duration;

/// Bounded retry with exponential backoff for transient fetch failures.
///
/// Permanent failures ([`FetchError::is_permanent`]) are returned immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Values below 1 behave like 1.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

/// The last error of a retried operation and how many attempts were made.
#[derive(Debug)]
pub struct RetryFailure {
    pub attempts: u32,
    pub error: FetchError,
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based): doubles each time, capped.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_permanent() || attempt >= max_attempts => {
                    return Err(RetryFailure {
                        attempts: attempt,
                        error,
                    });
                }
                Err(error) => {
                    let delay = self.backoff_for(attempt - 1);
                    warn!(
                        "Attempt {}/{} for {} failed ({}); retrying in {:?}",
                        attempt, max_attempts, label, error, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> FetchError {
        FetchError::HttpStatus {
            url: "u".to_string(),
            status: StatusCode::BAD_GATEWAY,
        }
    }

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        };
        assert_eq!(policy.backoff_for(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(400));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(40), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = quick(3)
            .run("test", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient())
                } else {
                    Ok(7u64)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let failure = quick(4)
            .run("test", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(transient())
            })
            .await
            .unwrap_err();
        assert_eq!(failure.attempts, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let failure = quick(5)
            .run("test", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(FetchError::NotFound {
                    url: "u".to_string(),
                })
            })
            .await
            .unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert!(failure.error.is_permanent());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
