//! Mock clock for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

use crate::clock::Clock;

/// Wall clock that follows tokio's (pausable) monotonic time.
///
/// `now()` is a fixed base plus the tokio time elapsed since creation, so with
/// `#[tokio::test(start_paused = true)]` hours of scheduled waits complete
/// instantly while timestamps still advance consistently.
///
/// # Example
///
/// ```rust,ignore
/// use airloop_core::testing::MockClock;
///
/// let clock = MockClock::new();
/// let before = clock.now();
/// clock.sleep(Duration::from_secs(3600)).await;
/// assert_eq!(clock.now() - before, chrono::Duration::hours(1));
/// ```
#[derive(Debug, Clone)]
pub struct MockClock {
    base: DateTime<Utc>,
    origin: Instant,
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClock {
    /// Create a clock starting at the current wall-clock time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Create a clock starting at `base`.
    pub fn starting_at(base: DateTime<Utc>) -> Self {
        Self {
            base,
            origin: Instant::now(),
        }
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.base + elapsed
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
