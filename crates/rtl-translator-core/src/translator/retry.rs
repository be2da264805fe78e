//! Exponential backoff with jitter, driven as an explicit state machine.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::config::TranslatorConfig;
use crate::error::{Error, Result};

/// Fraction of the exponential delay added as random jitter.
const JITTER_FRACTION: f64 = 0.25;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &TranslatorConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

/// `min(base * 2^failures, max)` plus up to a quarter of that as jitter.
///
/// `jitter` is a sample in `[0, 1)`; passing it in keeps this function pure.
pub fn backoff_delay(base: Duration, max: Duration, failures: u32, jitter: f64) -> Duration {
    let factor = 2u32.saturating_pow(failures);
    let exp = base.saturating_mul(factor).min(max);
    let extra = exp.mul_f64(JITTER_FRACTION * jitter.clamp(0.0, 1.0));
    exp + extra
}

enum RetryState<T> {
    Attempting { attempt: u32 },
    Backoff { next_attempt: u32, delay: Duration },
    Done(Result<T>),
}

/// Run `op` until it succeeds, fails permanently, or `max_attempts` is reached.
///
/// `op` receives the 1-based attempt number. Backoff sleeps race `cancel`;
/// a fired token yields [`Error::Cancelled`]. Any other terminal failure is
/// reported as [`Error::TranslationFailed`].
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut state = RetryState::Attempting { attempt: 1 };

    loop {
        state = match state {
            RetryState::Attempting { attempt } => {
                if cancel.is_cancelled() {
                    RetryState::Done(Err(Error::Cancelled))
                } else {
                    match op(attempt).await {
                        Ok(value) => RetryState::Done(Ok(value)),
                        Err(Error::Cancelled) => RetryState::Done(Err(Error::Cancelled)),
                        Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                            let mut delay = backoff_delay(
                                policy.base_delay,
                                policy.max_delay,
                                attempt - 1,
                                rand::random::<f64>(),
                            );
                            if let Error::TranslationRateLimited {
                                retry_after: Some(secs),
                            } = e
                            {
                                delay = delay.max(Duration::from_secs(secs));
                            }
                            warn!(
                                "Attempt {}/{} failed ({}), retrying in {:?}",
                                attempt, policy.max_attempts, e, delay
                            );
                            RetryState::Backoff {
                                next_attempt: attempt + 1,
                                delay,
                            }
                        }
                        Err(e) => RetryState::Done(Err(Error::TranslationFailed {
                            attempts: attempt,
                            reason: e.to_string(),
                        })),
                    }
                }
            }
            RetryState::Backoff {
                next_attempt,
                delay,
            } => {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {
                        debug!("Backoff elapsed, starting attempt {}", next_attempt);
                        RetryState::Attempting { attempt: next_attempt }
                    }
                    () = cancel.cancelled() => RetryState::Done(Err(Error::Cancelled)),
                }
            }
            RetryState::Done(result) => return result,
        };
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let base = Duration::from_millis(500);
        let max = Duration::from_secs(8);
        assert_eq!(backoff_delay(base, max, 0, 0.0), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, max, 1, 0.0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, max, 3, 0.0), Duration::from_millis(4000));
        assert_eq!(backoff_delay(base, max, 10, 0.0), max);
        assert_eq!(backoff_delay(base, max, 40, 0.0), max);
    }

    #[test]
    fn test_backoff_jitter_is_bounded() {
        let base = Duration::from_millis(400);
        let max = Duration::from_secs(8);
        let d = backoff_delay(base, max, 0, 0.999);
        assert!(d >= base);
        assert!(d <= base + base / 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&policy(5), &CancelToken::never(), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::TranslationTimeout)
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_ceiling() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(&policy(3), &CancelToken::never(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::TranslationRequest("HTTP 503".into())) }
        })
        .await;

        assert!(matches!(
            result,
            Err(Error::TranslationFailed { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(&policy(5), &CancelToken::never(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::TranslationInvalidResponse("bad".into())) }
        })
        .await;

        assert!(matches!(
            result,
            Err(Error::TranslationFailed { attempts: 1, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_backoff() {
        let (handle, token) = CancelToken::new();
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(&policy(5), &token, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            handle.cancel();
            async { Err(Error::TranslationTimeout) }
        })
        .await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_is_a_lower_bound() {
        let start = tokio::time::Instant::now();
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&policy(2), &CancelToken::never(), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(Error::TranslationRateLimited {
                        retry_after: Some(30),
                    })
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
