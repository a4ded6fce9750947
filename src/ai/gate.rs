//! Concurrency Gate
//!
//! Bounds the number of in-flight analysis units and spaces their starts by a
//! minimum delay. A unit rejected by service rate limiting is retried with
//! exponential backoff, never sooner than the service's `Retry-After` hint.
//! Other failures are returned immediately.

use backon::{ExponentialBuilder, Retryable};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::warn;

use crate::constants::retry as retry_constants;
use crate::types::{DocError, Result};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: retry_constants::MAX_RETRIES,
            base_delay: Duration::from_millis(retry_constants::BASE_DELAY_MS),
            max_delay: Duration::from_secs(retry_constants::MAX_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

/// Run `op`, calling it again from scratch while it fails with a rate
/// limit and attempts remain. Any other error is returned as is.
pub async fn retry_rate_limited<T, F, Fut>(policy: &RetryPolicy, label: &str, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    op.retry(policy.backoff())
        .when(DocError::is_rate_limit)
        .adjust(|err: &DocError, planned: Option<Duration>| match (planned, err.retry_after()) {
            (Some(wait), Some(hint)) => Some(wait.max(hint)),
            (planned, _) => planned,
        })
        .notify(|err, wait| {
            warn!("{}: rate limited ({}), retrying in {:?}", label, err, wait);
        })
        .await
}

#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    min_delay: Duration,
    /// Start slot handed to the most recent unit
    last_start: Arc<Mutex<Option<Instant>>>,
    retry: RetryPolicy,
}

impl ConcurrencyGate {
    pub fn new(max_in_flight: usize, min_delay: Duration, retry: RetryPolicy) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_in_flight.max(1))),
            min_delay,
            last_start: Arc::new(Mutex::new(None)),
            retry,
        }
    }

    /// Permits currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run one unit through the gate. `op` is called again from scratch on
    /// each rate-limit retry, so it should rebuild any per-unit state.
    pub async fn run<T, F, Fut>(&self, label: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.pace().await;

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| DocError::phase("gate", "concurrency gate closed"))?;

        retry_rate_limited(&self.retry, label, op).await
    }

    /// Wait for this unit's start slot: at least `min_delay` from now and
    /// `min_delay` after the previous unit's slot.
    async fn pace(&self) {
        if self.min_delay.is_zero() {
            return;
        }
        let start = {
            let mut last = self.last_start.lock().await;
            let earliest = Instant::now() + self.min_delay;
            let start = match *last {
                Some(previous) => earliest.max(previous + self.min_delay),
                None => earliest,
            };
            *last = Some(start);
            start
        };
        tokio::time::sleep_until(start).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorCategory, LlmError};
    use futures::stream::{self, StreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    fn rate_limited() -> DocError {
        LlmError::new(ErrorCategory::RateLimit, "429 Too Many Requests").into()
    }

    #[tokio::test]
    async fn test_in_flight_bounded() {
        let gate = ConcurrencyGate::new(2, Duration::ZERO, fast_policy(0));
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results: Vec<Result<usize>> = stream::iter(0..8)
            .map(|i| {
                let gate = gate.clone();
                let current = current.clone();
                let peak = peak.clone();
                async move {
                    gate.run("unit", || {
                        let current = current.clone();
                        let peak = peak.clone();
                        async move {
                            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            current.fetch_sub(1, Ordering::SeqCst);
                            Ok(i)
                        }
                    })
                    .await
                }
            })
            .buffer_unordered(8)
            .collect()
            .await;

        assert_eq!(results.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_retried_then_succeeds() {
        let gate = ConcurrencyGate::new(1, Duration::ZERO, fast_policy(3));
        let attempts = AtomicUsize::new(0);
        let result = gate
            .run("unit", || async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(rate_limited())
                } else {
                    Ok("done")
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_attempts() {
        let gate = ConcurrencyGate::new(1, Duration::ZERO, fast_policy(2));
        let attempts = AtomicUsize::new(0);
        let result: Result<()> = gate
            .run("unit", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(rate_limited())
            })
            .await;
        assert!(result.unwrap_err().is_rate_limit());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_delay_spaces_unit_starts() {
        let delay = Duration::from_millis(100);
        let gate = ConcurrencyGate::new(4, delay, fast_policy(0));
        let t0 = Instant::now();

        let mut starts: Vec<Duration> = stream::iter(0..4)
            .map(|_| {
                let gate = gate.clone();
                async move {
                    let started = gate
                        .run("unit", || async { Ok::<_, DocError>(Instant::now()) })
                        .await
                        .unwrap();
                    started - t0
                }
            })
            .buffer_unordered(4)
            .collect()
            .await;
        starts.sort();

        for (i, start) in starts.iter().enumerate() {
            assert!(*start >= delay * (i as u32 + 1), "unit {} started at {:?}", i, start);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_waits_for_service_hint() {
        let gate = ConcurrencyGate::new(1, Duration::ZERO, fast_policy(2));
        let attempts = std::sync::Mutex::new(Vec::new());
        let result = gate
            .run("unit", || async {
                let mut attempts = attempts.lock().unwrap();
                attempts.push(Instant::now());
                if attempts.len() == 1 {
                    Err(LlmError::new(ErrorCategory::RateLimit, "429")
                        .retry_after(Duration::from_secs(5))
                        .into())
                } else {
                    Ok(())
                }
            })
            .await;

        assert!(result.is_ok());
        let attempts = attempts.lock().unwrap();
        assert_eq!(attempts.len(), 2);
        assert!(attempts[1] - attempts[0] >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeouts_not_retried() {
        let gate = ConcurrencyGate::new(1, Duration::ZERO, fast_policy(3));
        let attempts = AtomicUsize::new(0);
        let result: Result<()> = gate
            .run("unit", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(DocError::timeout("complete", Duration::from_secs(1)))
            })
            .await;
        assert!(matches!(result, Err(DocError::Timeout { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let gate = ConcurrencyGate::new(1, Duration::ZERO, fast_policy(3));
        let attempts = AtomicUsize::new(0);
        let result: Result<()> = gate
            .run("unit", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(DocError::Config("bad".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
