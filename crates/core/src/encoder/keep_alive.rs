//! Liveness loops keeping an encoder unit up.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, warn};

use super::config::EncoderConfig;
use super::error::EncoderError;
use super::traits::SupervisedEncoder;
use crate::clock::Clock;

/// Probe cadence and restart cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub liveness_interval: Duration,
    /// Unbounded when `None`.
    pub max_restarts: Option<u32>,
}

impl RestartPolicy {
    pub fn from_config(config: &EncoderConfig) -> Self {
        Self {
            liveness_interval: config.liveness_interval(),
            max_restarts: config.max_restarts,
        }
    }
}

/// Why [`keep_alive`] returned normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveOutcome {
    DeadlineReached,
    Shutdown,
}

/// Probes `encoder` every `liveness_interval` and restarts it whenever it
/// died, until `deadline` passes or shutdown is signalled.
///
/// The unit is never stopped here; the caller owns its teardown. A failed
/// respawn is retried on the next probe. Returns an error once the restart
/// cap would be exceeded.
pub async fn keep_alive(
    encoder: &mut dyn SupervisedEncoder,
    policy: &RestartPolicy,
    clock: &dyn Clock,
    deadline: DateTime<Utc>,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<KeepAliveOutcome, EncoderError> {
    loop {
        let remaining = clock.until(deadline);
        if remaining.is_zero() {
            return Ok(KeepAliveOutcome::DeadlineReached);
        }

        tokio::select! {
            _ = shutdown.recv() => return Ok(KeepAliveOutcome::Shutdown),
            _ = clock.sleep(remaining.min(policy.liveness_interval)) => {}
        }

        if clock.until(deadline).is_zero() {
            return Ok(KeepAliveOutcome::DeadlineReached);
        }

        check_and_restart(encoder, policy).await?;
    }
}

/// Probes `encoder` every `liveness_interval` and restarts it whenever it
/// died, with no deadline.
///
/// Only returns once the restart cap is exceeded, so it is meant to be raced
/// against the work that needs the encoder up.
pub async fn supervise(
    encoder: &mut dyn SupervisedEncoder,
    policy: &RestartPolicy,
    clock: &dyn Clock,
) -> EncoderError {
    loop {
        clock.sleep(policy.liveness_interval).await;
        if let Err(e) = check_and_restart(encoder, policy).await {
            return e;
        }
    }
}

async fn check_and_restart(
    encoder: &mut dyn SupervisedEncoder,
    policy: &RestartPolicy,
) -> Result<(), EncoderError> {
    if encoder.is_alive().await {
        return Ok(());
    }

    let restarts = encoder.process().restart_count;
    if let Some(limit) = policy.max_restarts {
        if restarts >= limit {
            error!(restarts, limit, "Encoder restart limit reached");
            return Err(EncoderError::RestartLimitExceeded { limit });
        }
    }

    warn!(restarts, "Encoder not running, restarting");
    if let Err(e) = encoder.restart().await {
        error!(error = %e, "Encoder restart failed, retrying on next probe");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncoderSupervisor;
    use crate::testing::{fixtures, MockClock, MockEncoderSupervisor};
    use tokio::time::Instant;

    fn policy(max_restarts: Option<u32>) -> RestartPolicy {
        RestartPolicy {
            liveness_interval: Duration::from_secs(15),
            max_restarts,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_until_deadline_without_restarts() {
        let supervisor = MockEncoderSupervisor::new();
        let plan = fixtures::session_plan(2);
        let mut encoder = supervisor.start(&plan, fixtures::INGEST_URL).await.unwrap();
        let (_tx, mut rx) = broadcast::channel(1);

        let clock = MockClock::new();
        let started = Instant::now();
        let deadline = clock.now() + chrono::Duration::minutes(10);
        let outcome = keep_alive(encoder.as_mut(), &policy(None), &clock, deadline, &mut rx)
            .await
            .unwrap();

        assert_eq!(outcome, KeepAliveOutcome::DeadlineReached);
        assert!(started.elapsed() >= Duration::from_secs(599));
        assert_eq!(encoder.process().restart_count, 0);
        assert_eq!(supervisor.probe_count().await, 39);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarts_after_crash() {
        let supervisor = MockEncoderSupervisor::new();
        supervisor.crash_on_probes(&[3]).await;
        let plan = fixtures::session_plan(2);
        let mut encoder = supervisor.start(&plan, fixtures::INGEST_URL).await.unwrap();
        let (_tx, mut rx) = broadcast::channel(1);

        let clock = MockClock::new();
        let deadline = clock.now() + chrono::Duration::minutes(5);
        keep_alive(encoder.as_mut(), &policy(None), &clock, deadline, &mut rx)
            .await
            .unwrap();

        assert_eq!(encoder.process().restart_count, 1);
        assert_eq!(supervisor.spawn_count().await, 2);
        // Every spawn used identical arguments.
        let argvs = supervisor.spawned_argvs().await;
        assert_eq!(argvs[0], argvs[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_cap() {
        let supervisor = MockEncoderSupervisor::new();
        supervisor.set_always_dead(true).await;
        let plan = fixtures::session_plan(1);
        let mut encoder = supervisor.start(&plan, fixtures::INGEST_URL).await.unwrap();
        let (_tx, mut rx) = broadcast::channel(1);

        let clock = MockClock::new();
        let deadline = clock.now() + chrono::Duration::hours(1);
        let result = keep_alive(encoder.as_mut(), &policy(Some(3)), &clock, deadline, &mut rx).await;

        assert!(matches!(
            result,
            Err(EncoderError::RestartLimitExceeded { limit: 3 })
        ));
        assert_eq!(encoder.process().restart_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts() {
        let supervisor = MockEncoderSupervisor::new();
        let plan = fixtures::session_plan(1);
        let mut encoder = supervisor.start(&plan, fixtures::INGEST_URL).await.unwrap();
        let (tx, mut rx) = broadcast::channel(1);

        let clock = MockClock::new();
        let deadline = clock.now() + chrono::Duration::hours(8);
        let signal = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(100)).await;
            let _ = tx.send(());
        });

        let outcome = keep_alive(encoder.as_mut(), &policy(None), &clock, deadline, &mut rx)
            .await
            .unwrap();
        assert_eq!(outcome, KeepAliveOutcome::Shutdown);
        signal.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_deadline_returns_immediately() {
        let supervisor = MockEncoderSupervisor::new();
        let plan = fixtures::session_plan(1);
        let mut encoder = supervisor.start(&plan, fixtures::INGEST_URL).await.unwrap();
        let (_tx, mut rx) = broadcast::channel(1);

        let clock = MockClock::new();
        let deadline = clock.now() - chrono::Duration::seconds(1);
        let outcome = keep_alive(encoder.as_mut(), &policy(None), &clock, deadline, &mut rx)
            .await
            .unwrap();
        assert_eq!(outcome, KeepAliveOutcome::DeadlineReached);
        assert_eq!(supervisor.probe_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervise_restarts_until_cap() {
        let supervisor = MockEncoderSupervisor::new();
        supervisor.crash_on_probes(&[2]).await;
        let plan = fixtures::session_plan(1);
        let mut encoder = supervisor.start(&plan, fixtures::INGEST_URL).await.unwrap();
        let clock = MockClock::new();

        // Races a pre-live wait; the crash is repaired before it finishes.
        let unlimited = policy(None);
        tokio::select! {
            e = supervise(encoder.as_mut(), &unlimited, &clock) => panic!("supervise returned: {}", e),
            _ = tokio::time::sleep(Duration::from_secs(120)) => {}
        }
        assert_eq!(encoder.process().restart_count, 1);
        assert_eq!(supervisor.spawn_count().await, 2);

        supervisor.set_always_dead(true).await;
        let e = supervise(encoder.as_mut(), &policy(Some(2)), &clock).await;
        assert!(matches!(e, EncoderError::RestartLimitExceeded { limit: 2 }));
        assert_eq!(encoder.process().restart_count, 2);
    }
}
