use crate::core::error::PipelineError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Fixed-delay retry policy of a per-item task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retry attempts after the first run (total runs = 1 + max_retries)
    pub max_retries: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            delay: Duration::from_secs(60),
        }
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the policy is exhausted.
///
/// The closure receives the 1-based attempt number. The returned error is the
/// one raised by the last attempt.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, PipelineError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(val) => return Ok(val),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                if attempt > policy.max_retries {
                    return Err(err);
                }
                warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}...",
                    attempt,
                    policy.max_retries + 1,
                    err,
                    policy.delay
                );
                attempt += 1;
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_until_exhausted() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = with_retry(&policy(3), |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(PipelineError::Transient("timeout".into()))
        })
        .await;

        assert_eq!(result, Err(PipelineError::Transient("timeout".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = with_retry(&policy(3), |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(PipelineError::Connectivity("refused".into()))
        })
        .await;

        assert!(matches!(result, Err(PipelineError::Connectivity(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let result = with_retry(&policy(3), |attempt| async move {
            if attempt < 3 {
                Err(PipelineError::Transient("blip".into()))
            } else {
                Ok(attempt)
            }
        })
        .await;
        assert_eq!(result, Ok(3));
    }
}
