//! One streaming session: broadcast and encoder driven together.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};

use super::types::{SchedulerStatus, SessionError, SessionOutcome, SessionReport, SessionSummary};
use crate::clock::Clock;
use crate::encoder::{
    keep_alive, supervise, EncoderProcess, EncoderSupervisor, KeepAliveOutcome, RestartPolicy,
    SupervisedEncoder,
};
use crate::lifecycle::{BroadcastCoordinator, BroadcastHandle, BroadcastState};
use crate::plan::SessionPlan;

/// Everything a session needs besides its plan.
#[derive(Clone)]
pub struct SessionContext {
    pub coordinator: Arc<BroadcastCoordinator>,
    pub supervisor: Arc<dyn EncoderSupervisor>,
    pub clock: Arc<dyn Clock>,
    pub restart_policy: RestartPolicy,
    /// How long before the scheduled start the encoder is launched.
    pub encoder_lead: Duration,
    pub status: Arc<RwLock<SchedulerStatus>>,
}

/// How the driven part of a session ended without error.
enum SessionEnd {
    DurationElapsed,
    Shutdown,
}

/// Resources acquired so far; released on every exit path.
#[derive(Default)]
struct Acquired {
    handle: Option<BroadcastHandle>,
    encoder: Option<Box<dyn SupervisedEncoder>>,
}

/// Runs `plan` to the end.
///
/// Whatever happens inside (errors, panics, shutdown), the broadcast is
/// finalized exactly once and the encoder is stopped before this returns.
pub async fn run_session(
    ctx: SessionContext,
    plan: SessionPlan,
    mut shutdown: broadcast::Receiver<()>,
) -> SessionReport {
    let started_at = ctx.clock.now();
    let mut acquired = Acquired::default();

    info!(session = %plan.short_id(), title = %plan.title, "Session starting");
    publish_summary(&ctx, &plan).await;

    let driven = AssertUnwindSafe(drive(&ctx, &plan, &mut acquired, &mut shutdown))
        .catch_unwind()
        .await;
    let result = match driven {
        Ok(result) => result,
        Err(panic) => Err(SessionError::Panicked(panic_message(panic))),
    };

    let outcome = finalize(&ctx, &mut acquired, result).await;

    let mut restart_count = 0;
    if let Some(mut encoder) = acquired.encoder.take() {
        restart_count = encoder.process().restart_count;
        if let Err(e) = encoder.stop().await {
            error!(session = %plan.short_id(), error = %e, "Failed to stop encoder");
        }
    }

    let report = SessionReport {
        session_id: plan.id,
        outcome,
        broadcast_state: acquired.handle.as_ref().map(|h| h.state()),
        restart_count,
        started_at,
        finished_at: ctx.clock.now(),
    };

    match &report.outcome {
        SessionOutcome::Completed => info!(
            session = %plan.short_id(),
            restarts = restart_count,
            "Session completed"
        ),
        SessionOutcome::Failed(reason) => error!(
            session = %plan.short_id(),
            restarts = restart_count,
            reason = %reason,
            "Session failed"
        ),
        SessionOutcome::Cancelled => warn!(session = %plan.short_id(), "Session cancelled"),
    }

    report
}

async fn drive(
    ctx: &SessionContext,
    plan: &SessionPlan,
    acquired: &mut Acquired,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<SessionEnd, SessionError> {
    let coordinator = &ctx.coordinator;

    // Once the broadcast exists it is owned by `acquired`, so only the
    // thumbnail step may be abandoned on shutdown.
    let handle = acquired.handle.insert(coordinator.open(plan).await?);
    publish_handle(ctx, handle).await;
    if or_shutdown(shutdown, coordinator.attach_thumbnail(handle, plan)).await.is_none() {
        return Ok(SessionEnd::Shutdown);
    }

    let lead = chrono::Duration::from_std(ctx.encoder_lead)
        .unwrap_or_else(|_| chrono::Duration::zero());
    let encoder_start = plan.planned_start - lead;
    if or_shutdown(shutdown, ctx.clock.sleep_until(encoder_start)).await.is_none() {
        return Ok(SessionEnd::Shutdown);
    }

    let encoder = acquired
        .encoder
        .insert(ctx.supervisor.start(plan, handle.ingest_url()).await?);
    publish_encoder(ctx, encoder.process()).await;

    // The encoder is kept up while waiting for ingest and the scheduled start.
    let pre_live = async {
        coordinator.await_ingest_active(handle).await?;
        coordinator.go_testing(handle).await?;
        publish_handle(ctx, handle).await;
        coordinator.go_live(handle).await?;
        Ok::<_, SessionError>(())
    };
    tokio::select! {
        _ = shutdown.recv() => return Ok(SessionEnd::Shutdown),
        result = pre_live => result?,
        e = supervise(encoder.as_mut(), &ctx.restart_policy, ctx.clock.as_ref()) => {
            return Err(e.into());
        }
    }
    publish_handle(ctx, handle).await;
    publish_encoder(ctx, encoder.process()).await;

    // The duration bound runs from the moment the broadcast went live.
    let bound = chrono::Duration::from_std(plan.duration_bound)
        .unwrap_or_else(|_| chrono::Duration::zero());
    let deadline = ctx.clock.now() + bound;
    info!(
        session = %plan.short_id(),
        broadcast = handle.broadcast_id(),
        until = %deadline,
        "Session live"
    );

    let outcome = keep_alive(
        encoder.as_mut(),
        &ctx.restart_policy,
        ctx.clock.as_ref(),
        deadline,
        shutdown,
    )
    .await?;
    publish_encoder(ctx, encoder.process()).await;

    Ok(match outcome {
        KeepAliveOutcome::DeadlineReached => SessionEnd::DurationElapsed,
        KeepAliveOutcome::Shutdown => SessionEnd::Shutdown,
    })
}

/// Brings the broadcast to its final state.
async fn finalize(
    ctx: &SessionContext,
    acquired: &mut Acquired,
    result: Result<SessionEnd, SessionError>,
) -> SessionOutcome {
    let coordinator = &ctx.coordinator;

    let Some(handle) = acquired.handle.as_mut() else {
        return match result {
            Ok(_) => SessionOutcome::Cancelled,
            Err(e) => SessionOutcome::Failed(e.to_string()),
        };
    };

    let outcome = match result {
        Ok(SessionEnd::DurationElapsed) => {
            if coordinator.complete(handle).await {
                SessionOutcome::Completed
            } else {
                SessionOutcome::Failed("broadcast completion not confirmed".to_string())
            }
        }
        Ok(SessionEnd::Shutdown) => {
            if handle.state() == BroadcastState::Live {
                coordinator.complete(handle).await;
            } else {
                coordinator.fail(handle, "shutdown before going live").await;
            }
            SessionOutcome::Cancelled
        }
        Err(e) => {
            let reason = e.to_string();
            coordinator.fail(handle, &reason).await;
            SessionOutcome::Failed(reason)
        }
    };

    publish_handle(ctx, handle).await;
    outcome
}

async fn or_shutdown<F: Future>(
    shutdown: &mut broadcast::Receiver<()>,
    fut: F,
) -> Option<F::Output> {
    tokio::select! {
        _ = shutdown.recv() => None,
        output = fut => Some(output),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn publish_summary(ctx: &SessionContext, plan: &SessionPlan) {
    let summary = SessionSummary {
        session_id: plan.id,
        title: plan.title.clone(),
        planned_start: plan.planned_start,
        broadcast_id: None,
        broadcast_state: None,
        encoder_pid: None,
        restart_count: 0,
    };
    ctx.status.write().await.current_session = Some(summary);
}

async fn publish_handle(ctx: &SessionContext, handle: &BroadcastHandle) {
    if let Some(summary) = ctx.status.write().await.current_session.as_mut() {
        summary.broadcast_id = Some(handle.broadcast_id().to_string());
        summary.broadcast_state = Some(handle.state());
    }
}

async fn publish_encoder(ctx: &SessionContext, process: EncoderProcess) {
    if let Some(summary) = ctx.status.write().await.current_session.as_mut() {
        summary.encoder_pid = process.pid;
        summary.restart_count = process.restart_count;
    }
}
