//! Retry of Transient failures at external-call boundaries.

use std::future::Future;

use tracing::warn;

use crate::config::RetryPolicy;
use crate::error::CoreResult;

/// Run an operation, re-attempting on Transient errors per the policy.
///
/// The operation runs at most `policy.attempts + 1` times. Structural,
/// Policy and Fatal errors return immediately; the last Transient error
/// is returned once attempts are exhausted.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> CoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CoreResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    what,
                    attempt + 1,
                    policy.attempts + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backoff;
    use crate::error::FixerError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay: Duration::from_millis(1),
            backoff: Backoff::Fixed,
        }
    }

    #[tokio::test]
    async fn test_transient_attempted_at_most_n_plus_one_times() {
        let calls = AtomicU32::new(0);
        let result: CoreResult<()> = retry_transient(&fast_policy(3), "fetch", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FixerError::Network("reset".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_structural_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: CoreResult<()> = retry_transient(&fast_policy(3), "fix", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FixerError::PatchMismatch("a.py".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_transient(&fast_policy(3), "push", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(FixerError::Network("timeout".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
