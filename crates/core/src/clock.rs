//! Wall-clock and sleep abstraction.
//!
//! Every timed wait in the orchestrator (ingest polling, waiting for the
//! scheduled start, the session duration bound, cooldowns) goes through a
//! [`Clock`], so tests can drive multi-hour sessions with paused tokio time.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of wall-clock time and sleeps.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Sleep for the given duration.
    async fn sleep(&self, duration: Duration);

    /// Time left until `deadline`, zero if it already passed.
    fn until(&self, deadline: DateTime<Utc>) -> Duration {
        (deadline - self.now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// Sleep until the wall clock reaches `deadline`.
    ///
    /// The remaining delta is recomputed after every wake-up, so an early
    /// wake never lets the caller proceed before the deadline.
    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        loop {
            let remaining = self.until(deadline);
            if remaining.is_zero() {
                return;
            }
            self.sleep(remaining).await;
        }
    }
}

/// Real clock backed by `chrono::Utc` and `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_until_past_deadline_is_zero() {
        let clock = SystemClock;
        let past = Utc::now() - chrono::Duration::seconds(30);
        assert_eq!(clock.until(past), Duration::ZERO);
    }

    #[test]
    fn test_until_future_deadline() {
        let clock = SystemClock;
        let future = Utc::now() + chrono::Duration::seconds(60);
        let remaining = clock.until(future);
        assert!(remaining > Duration::from_secs(58));
        assert!(remaining <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_sleep_until_reaches_deadline() {
        let clock = SystemClock;
        let deadline = Utc::now() + chrono::Duration::milliseconds(30);
        clock.sleep_until(deadline).await;
        assert!(clock.now() >= deadline);
    }
}
