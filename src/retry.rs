//! Bounded retry for idempotent outbound calls.
//!
//! Search providers, tool discovery and model completions are read-style
//! calls: repeating one after a transport failure cannot duplicate a remote
//! side effect. Remote tool invocations must not go through this helper.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::{LoreError, Result};

/// Hard ceiling on attempts, including the first.
pub const MAX_ATTEMPTS_CEILING: u32 = 2;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first), capped at two.
    pub max_attempts: u32,
    /// Backoff before the retry.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS_CEILING,
            initial_backoff: Duration::from_millis(250),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.clamp(1, MAX_ATTEMPTS_CEILING),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Execute an async operation, retrying once on transport failures.
    ///
    /// Errors that are not [`LoreError::is_retryable`] are returned
    /// immediately.
    pub async fn execute<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.clamp(1, MAX_ATTEMPTS_CEILING);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let retryable = e
                        .downcast_ref::<LoreError>()
                        .map(LoreError::is_retryable)
                        .unwrap_or(false);
                    if !retryable || attempt >= attempts {
                        return Err(e);
                    }

                    tracing::warn!(
                        call = label,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Retrying after transport failure"
                    );

                    // Jitter: 75%-125% of backoff
                    let jitter_factor = 0.75 + rand::random::<f64>() * 0.5;
                    let sleep_duration =
                        Duration::from_secs_f64(self.initial_backoff.as_secs_f64() * jitter_factor);
                    tokio::time::sleep(sleep_duration).await;
                }
            }
        }
    }
}

/// Wrap a future with a timeout that maps expiry to [`LoreError::UpstreamTimeout`].
pub async fn with_timeout<T>(
    duration: Duration,
    label: &str,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(LoreError::UpstreamTimeout(format!(
            "{} did not respond within {}ms",
            label,
            duration.as_millis()
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retries_transport_failure_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<u32> = fast_policy()
            .execute("test", || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n == 0 {
                        Err(anyhow::Error::from(LoreError::UpstreamTimeout("first".into())))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_second_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<u32> = fast_policy()
            .execute("test", || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::Error::from(LoreError::UpstreamTimeout("always".into())))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_answered_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<u32> = fast_policy()
            .execute("test", || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::Error::from(LoreError::Authentication("401".into())))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_config_attempts_are_capped() {
        let config = RetryConfig {
            max_attempts: 9,
            initial_backoff_ms: 10,
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 2);
    }

    #[tokio::test]
    async fn test_with_timeout_maps_expiry() {
        let result: Result<()> = with_timeout(Duration::from_millis(5), "sleepy", async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoreError>(),
            Some(LoreError::UpstreamTimeout(_))
        ));
    }
}
