//! Bounded polling with cancellation support.
//!
//! Provides a generic abstraction for waiting on a cloud resource (or any
//! async condition) with a fixed poll interval, a bounded number of
//! attempts, and cancellation.

use backon::{BackoffBuilder, ConstantBuilder};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for bounded polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between checks
    pub interval: Duration,
    /// Total time budget; bounds the number of checks
    pub timeout: Duration,
}

impl PollConfig {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Number of checks allowed: `floor(timeout / interval) + 1`.
    ///
    /// The first check runs immediately, so the last one lands at the largest
    /// multiple of `interval` that does not exceed `timeout`.
    pub fn max_attempts(&self) -> u32 {
        let interval = self.interval.as_millis();
        if interval == 0 {
            return 1;
        }
        let attempts = self.timeout.as_millis() / interval + 1;
        u32::try_from(attempts).unwrap_or(u32::MAX)
    }
}

/// How a wait ended, when the check itself never failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The check reported the condition after this many attempts
    Ready { attempts: u32 },
    /// Every attempt was used without the condition holding
    Exhausted { attempts: u32 },
    /// The cancellation token fired first
    Cancelled { attempts: u32 },
}

/// Poll `check` until it returns `Ok(true)`, attempts run out, or `cancel` fires.
///
/// Uses `backon::ConstantBuilder` for delay calculation and `tokio::select!`
/// for cancellation support. A check error ends the wait immediately and is
/// returned unchanged.
///
/// # Example
/// ```ignore
/// let outcome = wait_for_resource(
///     &PollConfig::new(Duration::from_secs(60), Duration::from_secs(2)),
///     Some(&abort),
///     || async { client.exists(kind, id).await.map(|present| !present) },
///     "net-a",
/// ).await?;
/// ```
pub async fn wait_for_resource<F, Fut, E>(
    config: &PollConfig,
    cancel: Option<&CancellationToken>,
    mut check: F,
    resource_name: &str,
) -> Result<WaitOutcome, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: Display,
{
    let max_attempts = config.max_attempts();
    let mut delays = ConstantBuilder::default()
        .with_delay(config.interval)
        .with_max_times(max_attempts.saturating_sub(1) as usize)
        .build();
    let mut attempts = 0u32;

    loop {
        // Check cancellation before each attempt
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Ok(WaitOutcome::Cancelled { attempts });
        }

        attempts += 1;
        match check().await {
            Ok(true) => {
                debug!(resource = %resource_name, attempts, "Condition met");
                return Ok(WaitOutcome::Ready { attempts });
            }
            Ok(false) => {
                let Some(delay) = delays.next() else {
                    return Ok(WaitOutcome::Exhausted { attempts });
                };
                debug!(
                    resource = %resource_name,
                    attempt = attempts,
                    max_attempts,
                    delay_ms = delay.as_millis(),
                    "Condition not met, polling again"
                );

                // Wait with cancellation support
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = async {
                        if let Some(token) = cancel {
                            token.cancelled().await
                        } else {
                            std::future::pending::<()>().await
                        }
                    } => {
                        return Ok(WaitOutcome::Cancelled { attempts });
                    }
                }
            }
            Err(e) => {
                warn!(resource = %resource_name, error = %e, "Check failed");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_max_attempts() {
        assert_eq!(PollConfig::new(secs(5), secs(2)).max_attempts(), 3);
        assert_eq!(PollConfig::new(secs(60), secs(2)).max_attempts(), 31);
        assert_eq!(PollConfig::new(secs(4), secs(2)).max_attempts(), 3);
        assert_eq!(PollConfig::new(secs(1), secs(2)).max_attempts(), 1);
        assert_eq!(PollConfig::new(Duration::ZERO, secs(2)).max_attempts(), 1);
        assert_eq!(PollConfig::new(secs(5), Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_first_check() {
        let outcome = wait_for_resource(
            &PollConfig::new(secs(5), secs(2)),
            None,
            || async { Ok::<_, String>(true) },
            "test",
        )
        .await
        .unwrap();
        assert_eq!(outcome, WaitOutcome::Ready { attempts: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_after_bounded_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();

        let counter = calls.clone();
        let outcome = wait_for_resource(
            &PollConfig::new(secs(5), secs(2)),
            None,
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(false)
                }
            },
            "test",
        )
        .await
        .unwrap();

        assert_eq!(outcome, WaitOutcome::Exhausted { attempts: 3 });
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Checks at 0s, 2s and 4s; no trailing sleep
        let elapsed = start.elapsed();
        assert!(elapsed >= secs(4) && elapsed < secs(5), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_exact_multiple_timeout_checks_at_the_deadline() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();

        let counter = calls.clone();
        let outcome = wait_for_resource(
            &PollConfig::new(secs(4), secs(2)),
            None,
            move || {
                let counter = counter.clone();
                // Ready only on the third check, at t=4s
                async move { Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst) == 2) }
            },
            "test",
        )
        .await
        .unwrap();

        assert_eq!(outcome, WaitOutcome::Ready { attempts: 3 });
        assert_eq!(start.elapsed(), secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_error_propagates() {
        let result = wait_for_resource(
            &PollConfig::new(secs(5), secs(2)),
            None,
            || async { Err::<bool, _>("forbidden".to_string()) },
            "test",
        )
        .await;
        assert_eq!(result, Err("forbidden".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_sleep() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(secs(3)).await;
            canceller.cancel();
        });

        let outcome = wait_for_resource(
            &PollConfig::new(secs(60), secs(2)),
            Some(&token),
            || async { Ok::<_, String>(false) },
            "test",
        )
        .await
        .unwrap();
        assert_eq!(outcome, WaitOutcome::Cancelled { attempts: 2 });
    }

    #[tokio::test]
    async fn test_cancelled_before_first_check() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = wait_for_resource(
            &PollConfig::new(secs(60), secs(2)),
            Some(&token),
            || async { Ok::<_, String>(true) },
            "test",
        )
        .await
        .unwrap();
        assert_eq!(outcome, WaitOutcome::Cancelled { attempts: 0 });
    }
}
