//! Retry logic with exponential backoff for backend connections

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::application::errors::StorageError;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try
    pub max_retries: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,

    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Create a config with no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Run `operation` until it succeeds or the retry budget is spent.
///
/// Exhaustion is reported as [`StorageError::Unavailable`] carrying the
/// number of attempts and the last failure.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{}: succeeded after {} retries", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                if attempt >= config.max_retries {
                    warn!(
                        "{}: giving up after {} attempts: {}",
                        operation_name,
                        attempt + 1,
                        e
                    );
                    return Err(StorageError::Unavailable {
                        attempts: attempt + 1,
                        message: e.to_string(),
                    });
                }

                let delay = config.delay_for_attempt(attempt);
                warn!(
                    "{}: attempt {} failed, retrying in {:?}: {}",
                    operation_name,
                    attempt + 1,
                    delay,
                    e
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_delay_is_capped() {
        let config = fast();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(2));
        assert_eq!(config.delay_for_attempt(10), Duration::from_millis(4));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(), "flaky", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(StorageError::Backend("not yet".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempts() {
        let result: Result<(), _> = with_retry(&fast(), "down", || async {
            Err(StorageError::Backend("refused".into()))
        })
        .await;

        match result {
            Err(StorageError::Unavailable { attempts, message }) => {
                assert_eq!(attempts, 4);
                assert!(message.contains("refused"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
