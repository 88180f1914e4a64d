//! Session scheduler implementation.
//!
//! Runs the cycle `Preparing → Running → Cooldown` forever:
//! - Preparing: load the asset pool and build a plan
//! - Running: the session runs as its own task; the loop waits for its report
//! - Cooldown: fixed pause after a session, flat backoff after a failure

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::config::SchedulerConfig;
use super::planner::SessionPlanner;
use super::session::{run_session, SessionContext};
use super::types::{CycleState, SchedulerStatus, SessionError, SessionOutcome, SessionReport};
use crate::clock::Clock;
use crate::encoder::{EncoderSupervisor, RestartPolicy};
use crate::lifecycle::BroadcastCoordinator;
use crate::media::AssetSource;
use crate::metrics;
use crate::plan::SessionPlan;

/// State shared by the scheduler handle and its loop task.
#[derive(Clone)]
struct CycleRunner {
    config: SchedulerConfig,
    planner: SessionPlanner,
    assets: Arc<dyn AssetSource>,
    ctx: SessionContext,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

/// The session scheduler: the process's permanent background loop.
pub struct SessionScheduler {
    runner: CycleRunner,
    loop_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionScheduler {
    /// Create a new scheduler.
    pub fn new(
        config: SchedulerConfig,
        restart_policy: RestartPolicy,
        assets: Arc<dyn AssetSource>,
        coordinator: Arc<BroadcastCoordinator>,
        supervisor: Arc<dyn EncoderSupervisor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let lifecycle = coordinator.config().clone();

        let ctx = SessionContext {
            coordinator,
            supervisor,
            clock,
            restart_policy,
            encoder_lead: lifecycle.encoder_lead(),
            status: Arc::new(RwLock::new(SchedulerStatus::default())),
        };

        Self {
            runner: CycleRunner {
                planner: SessionPlanner::new(config.clone(), lifecycle.scheduled_start_delay()),
                config,
                assets,
                ctx,
                running: Arc::new(AtomicBool::new(false)),
                shutdown_tx,
            },
            loop_task: Mutex::new(None),
        }
    }

    /// Start the scheduler loop.
    pub async fn start(&self) {
        if self.runner.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return;
        }

        info!("Starting session scheduler");
        self.runner.ctx.status.write().await.running = true;

        let runner = self.runner.clone();
        let shutdown_rx = self.runner.shutdown_tx.subscribe();
        let task = tokio::spawn(async move { runner.run_loop(shutdown_rx).await });
        *self.loop_task.lock().await = Some(task);
    }

    /// Stop the scheduler. Returns once the running session (if any) has
    /// finalized its broadcast and stopped its encoder.
    pub async fn stop(&self) {
        if !self.runner.running.swap(false, Ordering::SeqCst) {
            warn!("Scheduler not running");
            return;
        }

        info!("Stopping session scheduler");
        let _ = self.runner.shutdown_tx.send(());

        if let Some(task) = self.loop_task.lock().await.take() {
            if let Err(e) = task.await {
                error!("Scheduler loop ended abnormally: {}", e);
            }
        }

        info!("Session scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.runner.running.load(Ordering::SeqCst)
    }

    /// Get current scheduler status.
    pub async fn status(&self) -> SchedulerStatus {
        self.runner.ctx.status.read().await.clone()
    }
}

impl CycleRunner {
    async fn run_loop(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Scheduler loop started");

        loop {
            let Some(pause) = self.run_cycle().await else {
                break;
            };
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let next = self.ctx.clock.now()
                + chrono::Duration::from_std(pause).unwrap_or_else(|_| chrono::Duration::zero());
            self.set_state(CycleState::Cooldown).await;
            self.ctx.status.write().await.next_cycle_at = Some(next);
            info!("Next cycle in {}s", pause.as_secs());

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Scheduler loop received shutdown signal");
                    break;
                }
                _ = self.ctx.clock.sleep(pause) => {}
            }
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
        }

        self.set_state(CycleState::Idle).await;
        {
            let mut status = self.ctx.status.write().await;
            status.running = false;
            status.next_cycle_at = None;
        }
        info!("Scheduler loop stopped");
    }

    /// Runs one cycle and returns the pause before the next, or `None` when
    /// the scheduler is shutting down.
    async fn run_cycle(&self) -> Option<Duration> {
        // Subscribed before preparing so a stop during preparation still
        // reaches the session.
        let session_rx = self.shutdown_tx.subscribe();

        self.set_state(CycleState::Preparing).await;
        {
            let mut status = self.ctx.status.write().await;
            status.cycles += 1;
            status.next_cycle_at = None;
        }

        let plan = match self.prepare().await {
            Ok(plan) => plan,
            Err(e) => {
                let reason = match &e {
                    SessionError::EmptyPool => "empty_pool",
                    SessionError::Assets(_) => "asset_source",
                    _ => "other",
                };
                error!("Cycle deferred: {}", e);
                metrics::CYCLES_DEFERRED.with_label_values(&[reason]).inc();
                self.ctx.status.write().await.last_error = Some(e.to_string());
                return Some(self.config.failure_backoff());
            }
        };

        if !self.running.load(Ordering::SeqCst) {
            return None;
        }

        self.set_state(CycleState::Running).await;
        metrics::SESSIONS_STARTED.inc();

        let session_id = plan.id;
        let started_at = self.ctx.clock.now();
        let session = tokio::spawn(run_session(self.ctx.clone(), plan, session_rx));

        let report = match session.await {
            Ok(report) => report,
            Err(e) => {
                error!("Session task died: {}", e);
                SessionReport {
                    session_id,
                    outcome: SessionOutcome::Failed(format!("session task died: {}", e)),
                    broadcast_state: None,
                    restart_count: 0,
                    started_at,
                    finished_at: self.ctx.clock.now(),
                }
            }
        };

        self.record(&report).await;

        match report.outcome {
            SessionOutcome::Completed => Some(self.config.cooldown()),
            SessionOutcome::Failed(_) => Some(self.config.failure_backoff()),
            SessionOutcome::Cancelled => None,
        }
    }

    async fn prepare(&self) -> Result<SessionPlan, SessionError> {
        let pool = self.assets.load_pool().await?;
        info!(
            visuals = pool.visuals.len(),
            tracks = pool.audio.len(),
            "Asset pool loaded from {}",
            self.assets.name()
        );

        let now = self.ctx.clock.now();
        let plan = {
            let mut rng = rand::thread_rng();
            self.planner.plan(&pool, now, &mut rng)?
        };

        info!(
            session = %plan.short_id(),
            visual = %plan.visual.display_name,
            tracks = plan.audio_queue.len(),
            planned_start = %plan.planned_start,
            "Session planned: {}",
            plan.title
        );
        Ok(plan)
    }

    async fn record(&self, report: &SessionReport) {
        let label = report.outcome.label();
        metrics::SESSIONS_FINISHED.with_label_values(&[label]).inc();
        let secs = (report.finished_at - report.started_at).num_milliseconds().max(0) as f64 / 1000.0;
        metrics::SESSION_DURATION.with_label_values(&[label]).observe(secs);

        let mut status = self.ctx.status.write().await;
        match &report.outcome {
            SessionOutcome::Completed => status.sessions_completed += 1,
            SessionOutcome::Failed(reason) => {
                status.sessions_failed += 1;
                status.last_error = Some(reason.clone());
            }
            SessionOutcome::Cancelled => {}
        }
        status.current_session = None;
        status.last_report = Some(report.clone());
    }

    async fn set_state(&self, state: CycleState) {
        metrics::CYCLE_STATE.set(state.metric_code());
        self.ctx.status.write().await.cycle_state = state;
    }
}
