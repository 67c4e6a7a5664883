//! Constant-backoff retry for transient storage failures.
//!
//! Wraps `backon` with a constant interval rather than exponential backoff:
//! saga persistence retries on a fixed cadence, not a growing one.

use std::time::Duration;

use backon::{ConstantBuilder, Retryable};

/// Constant-backoff policy: `max_attempts` total tries, `delay` between each.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Default policy for saga store operations: 5 attempts, 2000ms apart.
    pub fn saga_store_default() -> Self {
        Self {
            delay: Duration::from_millis(2000),
            max_attempts: 5,
        }
    }

    fn builder(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times((self.max_attempts.saturating_sub(1)) as usize)
    }
}

/// Runs `op` up to `policy.max_attempts` times, retrying only while
/// `is_retryable` returns true for the error. Non-retryable errors propagate
/// on the first attempt.
pub async fn run_with_retry<F, Fut, T, E>(
    policy: RetryPolicy,
    is_retryable: impl Fn(&E) -> bool + Send + Sync,
    op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    op.retry(policy.builder())
        .when(|err| is_retryable(err))
        .notify(|err, dur| {
            tracing::warn!(error = ?err, delay_ms = dur.as_millis() as u64, "retrying after transient failure");
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq, Eq)]
    enum Err_ {
        Transient,
        Fatal,
    }

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            delay: Duration::from_millis(1),
            max_attempts: 5,
        };
        let result: Result<u32, Err_> = run_with_retry(policy, |e| *e == Err_::Transient, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Err_::Transient)
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_fatal_errors() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            delay: Duration::from_millis(1),
            max_attempts: 5,
        };
        let result: Result<u32, Err_> = run_with_retry(policy, |e| *e == Err_::Transient, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(Err_::Fatal) }
        })
        .await;

        assert_eq!(result, Err(Err_::Fatal));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            delay: Duration::from_millis(1),
            max_attempts: 3,
        };
        let result: Result<u32, Err_> = run_with_retry(policy, |e| *e == Err_::Transient, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(Err_::Transient) }
        })
        .await;

        assert_eq!(result, Err(Err_::Transient));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
