//! Exponential backoff with jitter for broker submission retries.

use std::time::Duration;

/// Compute the delay before attempt `attempt` (0-indexed), doubling from
/// `base_ms` and capped at `cap_ms`, with up to 50% jitter added to avoid
/// synchronized retries across sessions.
pub fn backoff_delay(attempt: u32, base_ms: u64, cap_ms: u64) -> Duration {
    let exp = base_ms.saturating_mul(1u64 << attempt.min(16));
    let capped = exp.min(cap_ms);
    let jitter = rand::random::<u64>() % (capped / 2 + 1);
    Duration::from_millis(capped / 2 + jitter)
}

/// Run `f` up to `max_attempts` times, sleeping with `backoff_delay`
/// between attempts, stopping early on the first success or on any error
/// the caller's `is_retryable` predicate rejects. On success, returns the
/// number of attempts made (1 = succeeded on the first try) alongside the
/// value, so a caller that persists a `retry_count` has something to write.
pub async fn with_retry<T, E, F, Fut>(
    max_attempts: u32,
    base_ms: u64,
    cap_ms: u64,
    is_retryable: impl Fn(&E) -> bool,
    mut f: F,
) -> Result<(T, u32), E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(v) => return Ok((v, attempt + 1)),
            Err(e) if attempt + 1 < max_attempts && is_retryable(&e) => {
                tokio::time::sleep(backoff_delay(attempt, base_ms, cap_ms)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_never_exceeds_cap() {
        for attempt in 0..10 {
            let d = backoff_delay(attempt, 500, 10_000);
            assert!(d.as_millis() as u64 <= 10_000);
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let result: Result<(u32, u32), &str> = with_retry(3, 1, 2, |_: &&str| true, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result, Ok((42, 3)));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let result: Result<(u32, u32), &str> = with_retry(3, 1, 2, |_: &&str| true, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move { Err("always fails") }
        })
        .await;
        assert_eq!(result, Err("always fails"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let attempts = AtomicU32::new(0);
        let result: Result<(u32, u32), &str> = with_retry(3, 1, 2, |_: &&str| false, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move { Err("terminal") }
        })
        .await;
        assert_eq!(result, Err("terminal"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
