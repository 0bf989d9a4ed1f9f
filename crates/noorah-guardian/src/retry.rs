//! Exponential backoff for notification delivery.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Backoff schedule for one delivery.
#[derive(Debug, Clone)]
pub struct Backoff {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles each time
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl Backoff {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Whether a failed attempt is worth repeating.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Run `attempt` until it succeeds, fails permanently, or retries run out.
///
/// Returns the last error together with the number of attempts made.
pub async fn with_backoff<F, Fut, T, E>(backoff: &Backoff, label: &str, attempt: F) -> Result<T, (E, u32)>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + std::fmt::Display,
{
    let mut retries = 0u32;

    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && retries < backoff.max_retries => {
                retries += 1;
                let delay = backoff.delay(retries);
                debug!(label, retry = retries, delay_ms = delay.as_millis() as u64, error = %e, "Delivery failed, backing off");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err((e, retries + 1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct Flaky(bool);

    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky(transient={})", self.0)
        }
    }

    impl Transient for Flaky {
        fn is_transient(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let backoff = Backoff::default().with_base_delay(Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
        assert_eq!(backoff.delay(30), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let backoff = Backoff::default().with_base_delay(Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result = with_backoff(&backoff, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Flaky(true))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.ok(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let backoff = Backoff::default().with_base_delay(Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_backoff(&backoff, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Flaky(false)) }
        })
        .await;

        let (_, attempts) = result.unwrap_err();
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let backoff = Backoff::default()
            .with_base_delay(Duration::from_millis(1))
            .with_max_retries(2);

        let result: Result<(), _> = with_backoff(&backoff, "test", || async { Err(Flaky(true)) }).await;
        let (_, attempts) = result.unwrap_err();
        assert_eq!(attempts, 3);
    }
}
