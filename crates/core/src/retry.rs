//! Bounded, fixed-interval retry policy.
//!
//! Remote calls and polls are retried a fixed number of times with a flat
//! interval between attempts. There is no exponential backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;

/// Maximum attempts × fixed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero behaves like one.
    pub max_attempts: u32,
    /// Delay between two consecutive attempts (milliseconds).
    pub interval_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval_ms: interval.as_millis() as u64,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Upper bound on the time spent sleeping between attempts.
    pub fn total_wait(&self) -> Duration {
        self.interval() * (self.attempts() - 1)
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// `op` receives the 1-based attempt number. The last error is returned
    /// when every attempt failed.
    pub async fn run<T, E, F, Fut>(&self, clock: &dyn Clock, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = self.attempts();
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= attempts => {
                    warn!("{} failed after {} attempts: {}", what, attempts, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("{} failed (attempt {}/{}): {}", what, attempt, attempts, e);
                    clock.sleep(self.interval()).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Poll `probe` until it reports `true`.
    ///
    /// Returns the attempt on which the probe succeeded, or `None` once the
    /// budget is exhausted. Exactly `attempts()` probes are made in the
    /// failure case.
    pub async fn poll<F, Fut>(&self, clock: &dyn Clock, what: &str, mut probe: F) -> Option<u32>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = bool>,
    {
        let attempts = self.attempts();
        for attempt in 1..=attempts {
            if probe(attempt).await {
                debug!("{} satisfied on attempt {}/{}", what, attempt, attempts);
                return Some(attempt);
            }
            if attempt < attempts {
                clock.sleep(self.interval()).await;
            }
        }
        None
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval_ms: 5000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_run_succeeds_after_transient_errors() {
        let policy = RetryPolicy::new(5, Duration::from_secs(5));
        let calls = AtomicU32::new(0);

        let result: Result<u32, String> = policy
            .run(&SystemClock, "flaky call", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err("transient".to_string())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_last_error() {
        let policy = RetryPolicy::new(4, Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = policy
            .run(&SystemClock, "always failing", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("error {}", attempt)) }
            })
            .await;

        assert_eq!(result, Err("error 4".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_exhausts_exact_budget() {
        let policy = RetryPolicy::new(10, Duration::from_secs(5));
        let probes = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let result = policy
            .poll(&SystemClock, "never true", |_| {
                probes.fetch_add(1, Ordering::SeqCst);
                async { false }
            })
            .await;

        assert_eq!(result, None);
        assert_eq!(probes.load(Ordering::SeqCst), 10);
        assert_eq!(start.elapsed(), Duration::from_secs(45));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_reports_successful_attempt() {
        let policy = RetryPolicy::new(10, Duration::from_secs(5));
        let result = policy
            .poll(&SystemClock, "second try", |attempt| async move { attempt == 2 })
            .await;
        assert_eq!(result, Some(2));
    }

    #[test]
    fn test_zero_attempts_behaves_like_one() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.attempts(), 1);
        assert_eq!(policy.total_wait(), Duration::ZERO);
    }

    #[test]
    fn test_deserialize() {
        let policy: RetryPolicy = toml::from_str("max_attempts = 10\ninterval_ms = 5000").unwrap();
        assert_eq!(policy.attempts(), 10);
        assert_eq!(policy.interval(), Duration::from_secs(5));
    }
}
