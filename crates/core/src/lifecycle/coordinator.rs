//! Drives one broadcast from creation to its final state.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::api::LiveApi;
use super::config::LifecycleConfig;
use super::error::LifecycleError;
use super::thumbnail::Thumbnailer;
use super::types::{BroadcastHandle, BroadcastRequest, BroadcastState, StreamRequest};
use crate::clock::Clock;
use crate::metrics;
use crate::plan::SessionPlan;

/// Sole writer of [`BroadcastHandle`] state.
///
/// Terminal states are sticky: once a handle is `Complete` or `Failed`
/// further finalization requests are no-ops, so every broadcast is finalized
/// exactly once.
pub struct BroadcastCoordinator {
    api: Arc<dyn LiveApi>,
    clock: Arc<dyn Clock>,
    config: LifecycleConfig,
    thumbnailer: Option<Thumbnailer>,
}

impl BroadcastCoordinator {
    pub fn new(api: Arc<dyn LiveApi>, clock: Arc<dyn Clock>, config: LifecycleConfig) -> Self {
        Self {
            api,
            clock,
            config,
            thumbnailer: None,
        }
    }

    /// Attach a thumbnail extractor used by [`create`](Self::create).
    pub fn with_thumbnailer(mut self, thumbnailer: Thumbnailer) -> Self {
        self.thumbnailer = Some(thumbnailer);
        self
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Creates the broadcast and its ingest stream, binds them, then sets a
    /// thumbnail.
    ///
    /// The thumbnail is best-effort. If anything after the broadcast creation
    /// fails, the broadcast is deleted again.
    pub async fn create(&self, plan: &SessionPlan) -> Result<BroadcastHandle, LifecycleError> {
        let handle = self.open(plan).await?;
        self.attach_thumbnail(&handle, plan).await;
        Ok(handle)
    }

    /// [`create`](Self::create) without the thumbnail step.
    pub async fn open(&self, plan: &SessionPlan) -> Result<BroadcastHandle, LifecycleError> {
        let retry = self.config.api_retry;
        let clock = self.clock.as_ref();
        let api = self.api.as_ref();

        let broadcast_request = BroadcastRequest {
            title: plan.title.clone(),
            description: plan.description.clone(),
            scheduled_start: plan.planned_start,
            privacy_status: self.config.privacy_status.clone(),
        };
        let stream_request = StreamRequest {
            title: plan.title.clone(),
            resolution: self.config.stream_resolution.clone(),
            frame_rate: self.config.stream_frame_rate.clone(),
        };

        let request = &broadcast_request;
        let broadcast_id = retry
            .run(clock, "create broadcast", move |_| api.create_broadcast(request))
            .await?;

        let request = &stream_request;
        let endpoint = match retry
            .run(clock, "create ingest stream", move |_| api.create_stream(request))
            .await
        {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.discard(&broadcast_id).await;
                return Err(e.into());
            }
        };

        let (id, stream_id) = (broadcast_id.as_str(), endpoint.stream_id.as_str());
        if let Err(e) = retry
            .run(clock, "bind broadcast", move |_| api.bind(id, stream_id))
            .await
        {
            self.discard(&broadcast_id).await;
            return Err(e.into());
        }

        let handle = BroadcastHandle::new(broadcast_id, endpoint, plan.planned_start);
        metrics::BROADCAST_TRANSITIONS
            .with_label_values(&[BroadcastState::Created.as_str()])
            .inc();
        info!(
            broadcast = handle.broadcast_id(),
            stream = handle.ingest_stream_id(),
            scheduled_start = %plan.planned_start,
            "Broadcast created"
        );

        Ok(handle)
    }

    /// Grabs a frame from the plan's visual and sets it as the broadcast
    /// thumbnail. Failures are logged and swallowed.
    pub async fn attach_thumbnail(&self, handle: &BroadcastHandle, plan: &SessionPlan) {
        let Some(thumbnailer) = &self.thumbnailer else {
            return;
        };

        match thumbnailer.extract(&plan.visual, &plan.short_id()).await {
            Ok(path) => {
                if let Err(e) = self.api.set_thumbnail(handle.broadcast_id(), &path).await {
                    warn!(broadcast = handle.broadcast_id(), error = %e, "Failed to set thumbnail");
                }
                let _ = tokio::fs::remove_file(&path).await;
            }
            Err(e) => {
                warn!(broadcast = handle.broadcast_id(), error = %e, "Skipping thumbnail");
            }
        }
    }

    async fn discard(&self, broadcast_id: &str) {
        if let Err(e) = self.api.delete_broadcast(broadcast_id).await {
            warn!(broadcast = broadcast_id, error = %e, "Failed to delete broadcast");
        }
    }

    /// Polls the ingest stream until it reports active.
    ///
    /// Exhausting the poll budget fails the broadcast.
    pub async fn await_ingest_active(
        &self,
        handle: &mut BroadcastHandle,
    ) -> Result<(), LifecycleError> {
        let policy = self.config.ingest_poll;
        let api = self.api.as_ref();
        let stream_id = handle.ingest_stream_id().to_string();
        let stream_id = stream_id.as_str();

        let polled = policy
            .poll(self.clock.as_ref(), "ingest activation", move |attempt| async move {
                match api.stream_status(stream_id).await {
                    Ok(status) => {
                        debug!(stream = stream_id, attempt, ?status, "Ingest status");
                        status.is_active()
                    }
                    Err(e) => {
                        warn!(stream = stream_id, attempt, error = %e, "Ingest status check failed");
                        false
                    }
                }
            })
            .await;

        match polled {
            Some(attempt) => {
                info!(
                    broadcast = handle.broadcast_id(),
                    attempt, "Ingest stream active"
                );
                Ok(())
            }
            None => {
                let err = LifecycleError::IngestNotActive {
                    attempts: policy.attempts(),
                };
                self.fail(handle, &err.to_string()).await;
                Err(err)
            }
        }
    }

    /// `Created → Testing`.
    pub async fn go_testing(&self, handle: &mut BroadcastHandle) -> Result<(), LifecycleError> {
        self.require(handle, BroadcastState::Testing).await
    }

    /// Waits for the scheduled start, then `Testing → Live`.
    pub async fn go_live(&self, handle: &mut BroadcastHandle) -> Result<(), LifecycleError> {
        let remaining = self.clock.until(handle.scheduled_start());
        if !remaining.is_zero() {
            info!(
                broadcast = handle.broadcast_id(),
                wait_secs = remaining.as_secs(),
                "Waiting for scheduled start"
            );
        }
        self.clock.sleep_until(handle.scheduled_start()).await;
        self.require(handle, BroadcastState::Live).await
    }

    async fn require(
        &self,
        handle: &mut BroadcastHandle,
        target: BroadcastState,
    ) -> Result<(), LifecycleError> {
        if self.transition(handle, target).await {
            Ok(())
        } else {
            Err(LifecycleError::TransitionFailed { target })
        }
    }

    /// `Live → Complete`. A broadcast whose completion cannot be confirmed
    /// ends up `Failed`. Returns whether it reached `Complete`.
    pub async fn complete(&self, handle: &mut BroadcastHandle) -> bool {
        if handle.is_finalized() {
            return handle.state() == BroadcastState::Complete;
        }
        if self.transition(handle, BroadcastState::Complete).await {
            return true;
        }
        if !handle.is_finalized() {
            self.mark(handle, BroadcastState::Failed);
        }
        false
    }

    /// Marks the broadcast `Failed` after a best-effort remote completion.
    pub async fn fail(&self, handle: &mut BroadcastHandle, reason: &str) {
        if handle.is_finalized() {
            debug!(
                broadcast = handle.broadcast_id(),
                state = %handle.state(),
                "Broadcast already finalized"
            );
            return;
        }

        error!(
            broadcast = handle.broadcast_id(),
            state = %handle.state(),
            reason,
            "Broadcast failed"
        );

        let previous = handle.state();
        if let Err(e) = self
            .api
            .transition(handle.broadcast_id(), BroadcastState::Complete)
            .await
        {
            warn!(broadcast = handle.broadcast_id(), error = %e, "Best-effort completion failed");
            if previous == BroadcastState::Created {
                self.discard(handle.broadcast_id()).await;
            }
        }

        self.mark(handle, BroadcastState::Failed);
    }

    /// Moves the handle to `target`.
    ///
    /// Requesting the current state succeeds without a remote call. Terminal
    /// handles refuse every other target, and `Live` is refused before the
    /// scheduled start.
    pub async fn transition(&self, handle: &mut BroadcastHandle, target: BroadcastState) -> bool {
        let current = handle.state();
        if current == target {
            return true;
        }
        if target == BroadcastState::Failed {
            self.fail(handle, "requested").await;
            return true;
        }
        if current.is_terminal() || !current.can_transition_to(target) {
            warn!(
                broadcast = handle.broadcast_id(),
                from = %current,
                to = %target,
                "Refusing invalid broadcast transition"
            );
            return false;
        }
        if target == BroadcastState::Live && self.clock.now() < handle.scheduled_start() {
            warn!(
                broadcast = handle.broadcast_id(),
                scheduled_start = %handle.scheduled_start(),
                "Refusing to go live before scheduled start"
            );
            return false;
        }

        let api = self.api.as_ref();
        let id = handle.broadcast_id().to_string();
        let id = id.as_str();
        let what = format!("transition to {}", target);

        match self
            .config
            .api_retry
            .run(self.clock.as_ref(), &what, move |_| api.transition(id, target))
            .await
        {
            Ok(()) => {
                self.mark(handle, target);
                true
            }
            Err(e) => {
                error!(broadcast = id, to = %target, error = %e, "Broadcast transition failed");
                false
            }
        }
    }

    fn mark(&self, handle: &mut BroadcastHandle, state: BroadcastState) {
        handle.set_state(state);
        metrics::BROADCAST_TRANSITIONS
            .with_label_values(&[state.as_str()])
            .inc();
        info!(broadcast = handle.broadcast_id(), state = %state, "Broadcast state changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::testing::{fixtures, LiveApiCall, MockClock, MockLiveApi};
    use std::time::Duration;

    fn coordinator(api: Arc<MockLiveApi>, clock: MockClock) -> BroadcastCoordinator {
        let config = LifecycleConfig {
            ingest_poll: RetryPolicy::new(10, Duration::from_secs(5)),
            api_retry: RetryPolicy::new(3, Duration::from_secs(5)),
            ..LifecycleConfig::default()
        };
        BroadcastCoordinator::new(api, Arc::new(clock), config)
    }

    fn plan_in(clock: &MockClock, minutes: i64) -> SessionPlan {
        fixtures::session_plan_starting(
            clock.now() + chrono::Duration::minutes(minutes),
            Duration::from_secs(8 * 3600),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_binds_stream() {
        let clock = MockClock::new();
        let api = Arc::new(MockLiveApi::new());
        let coordinator = coordinator(api.clone(), clock.clone());

        let handle = coordinator.create(&plan_in(&clock, 5)).await.unwrap();
        assert_eq!(handle.state(), BroadcastState::Created);
        assert!(handle.ingest_url().starts_with("rtmp://"));

        let calls = api.calls().await;
        assert!(matches!(calls[0], LiveApiCall::CreateBroadcast { .. }));
        assert!(matches!(calls[1], LiveApiCall::CreateStream));
        assert!(matches!(calls[2], LiveApiCall::Bind { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_failure_deletes_broadcast() {
        let clock = MockClock::new();
        let api = Arc::new(MockLiveApi::new());
        api.fail_operation("bind", u32::MAX).await;
        let coordinator = coordinator(api.clone(), clock.clone());

        let result = coordinator.create(&plan_in(&clock, 5)).await;
        assert!(result.is_err());

        assert_eq!(api.count(|c| matches!(c, LiveApiCall::Bind { .. })).await, 3);
        assert_eq!(
            api.count(|c| matches!(c, LiveApiCall::DeleteBroadcast { .. }))
                .await,
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_create_error_retried() {
        let clock = MockClock::new();
        let api = Arc::new(MockLiveApi::new());
        api.fail_operation("create_broadcast", 2).await;
        let coordinator = coordinator(api.clone(), clock.clone());

        assert!(coordinator.create(&plan_in(&clock, 5)).await.is_ok());
        assert_eq!(
            api.count(|c| matches!(c, LiveApiCall::CreateBroadcast { .. }))
                .await,
            3
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ingest_never_active_fails_after_budget() {
        let clock = MockClock::new();
        let api = Arc::new(MockLiveApi::new());
        api.set_active_after_polls(None).await;
        let coordinator = coordinator(api.clone(), clock.clone());

        let mut handle = coordinator.create(&plan_in(&clock, 5)).await.unwrap();
        let started = tokio::time::Instant::now();
        let result = coordinator.await_ingest_active(&mut handle).await;

        assert!(matches!(
            result,
            Err(LifecycleError::IngestNotActive { attempts: 10 })
        ));
        assert_eq!(started.elapsed(), Duration::from_secs(45));
        assert_eq!(handle.state(), BroadcastState::Failed);
        assert_eq!(
            api.count(|c| matches!(c, LiveApiCall::StreamStatus { .. }))
                .await,
            10
        );
        // Best-effort completion attempted once, no Testing requested.
        assert_eq!(api.transitions_to(BroadcastState::Complete).await, 1);
        assert_eq!(api.transitions_to(BroadcastState::Testing).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_go_live_waits_for_scheduled_start() {
        let clock = MockClock::new();
        let api = Arc::new(MockLiveApi::new().with_clock(Arc::new(clock.clone())));
        let coordinator = coordinator(api.clone(), clock.clone());
        let plan = plan_in(&clock, 5);

        let mut handle = coordinator.create(&plan).await.unwrap();
        coordinator.await_ingest_active(&mut handle).await.unwrap();
        coordinator.go_testing(&mut handle).await.unwrap();
        coordinator.go_live(&mut handle).await.unwrap();

        assert_eq!(handle.state(), BroadcastState::Live);
        assert!(clock.now() >= plan.planned_start);
        let live = api.transition_log().await;
        let live_at = live
            .iter()
            .find(|t| t.target == BroadcastState::Live)
            .map(|t| t.at)
            .unwrap();
        assert!(live_at >= plan.planned_start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_refused_before_scheduled_start() {
        let clock = MockClock::new();
        let api = Arc::new(MockLiveApi::new());
        let coordinator = coordinator(api.clone(), clock.clone());

        let mut handle = coordinator.create(&plan_in(&clock, 5)).await.unwrap();
        coordinator.go_testing(&mut handle).await.unwrap();
        assert!(!coordinator.transition(&mut handle, BroadcastState::Live).await);
        assert_eq!(handle.state(), BroadcastState::Testing);
        assert_eq!(api.transitions_to(BroadcastState::Live).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transition_is_idempotent() {
        let clock = MockClock::new();
        let api = Arc::new(MockLiveApi::new());
        let coordinator = coordinator(api.clone(), clock.clone());

        let mut handle = coordinator.create(&plan_in(&clock, 0)).await.unwrap();
        assert!(coordinator.transition(&mut handle, BroadcastState::Testing).await);
        assert!(coordinator.transition(&mut handle, BroadcastState::Testing).await);
        assert_eq!(api.transitions_to(BroadcastState::Testing).await, 1);

        // Skipping a state is refused without a remote call.
        let mut other = coordinator.create(&plan_in(&clock, 0)).await.unwrap();
        assert!(!coordinator.transition(&mut other, BroadcastState::Live).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalized_exactly_once() {
        let clock = MockClock::new();
        let api = Arc::new(MockLiveApi::new());
        let coordinator = coordinator(api.clone(), clock.clone());

        let mut handle = coordinator.create(&plan_in(&clock, 0)).await.unwrap();
        coordinator.go_testing(&mut handle).await.unwrap();
        coordinator.go_live(&mut handle).await.unwrap();

        assert!(coordinator.complete(&mut handle).await);
        assert!(coordinator.complete(&mut handle).await);
        coordinator.fail(&mut handle, "late error").await;

        assert_eq!(handle.state(), BroadcastState::Complete);
        assert_eq!(api.transitions_to(BroadcastState::Complete).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_complete_ends_failed() {
        let clock = MockClock::new();
        let api = Arc::new(MockLiveApi::new());
        let coordinator = coordinator(api.clone(), clock.clone());

        let mut handle = coordinator.create(&plan_in(&clock, 0)).await.unwrap();
        coordinator.go_testing(&mut handle).await.unwrap();
        coordinator.go_live(&mut handle).await.unwrap();

        api.fail_operation("transition", u32::MAX).await;
        assert!(!coordinator.complete(&mut handle).await);
        assert_eq!(handle.state(), BroadcastState::Failed);

        // Terminal: no more remote calls.
        let before = api.calls().await.len();
        coordinator.fail(&mut handle, "again").await;
        assert_eq!(api.calls().await.len(), before);
    }

    #[cfg(unix)]
    fn with_fake_ffmpeg(
        coordinator: BroadcastCoordinator,
        dir: &std::path::Path,
        body: &str,
        timeout_secs: u64,
    ) -> BroadcastCoordinator {
        use super::super::config::ThumbnailConfig;
        use super::super::thumbnail::{test_support, Thumbnailer};

        let ffmpeg = test_support::script(dir, "ffmpeg", body);
        coordinator.with_thumbnailer(Thumbnailer::new(
            ffmpeg,
            dir.join("thumbs"),
            ThumbnailConfig {
                timeout_secs,
                ..ThumbnailConfig::default()
            },
        ))
    }

    async fn thumbnail_and_delete_calls(api: &MockLiveApi) -> (usize, usize) {
        (
            api.count(|c| matches!(c, LiveApiCall::SetThumbnail { .. }))
                .await,
            api.count(|c| matches!(c, LiveApiCall::DeleteBroadcast { .. }))
                .await,
        )
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_create_sets_thumbnail() {
        let dir = tempfile::TempDir::new().unwrap();
        let clock = MockClock::new();
        let api = Arc::new(MockLiveApi::new());
        let coordinator = with_fake_ffmpeg(
            coordinator(api.clone(), clock.clone()),
            dir.path(),
            super::super::thumbnail::test_support::WRITE_LAST_ARG,
            30,
        );

        let handle = coordinator.create(&plan_in(&clock, 5)).await.unwrap();
        assert_eq!(handle.state(), BroadcastState::Created);
        assert_eq!(thumbnail_and_delete_calls(&api).await, (1, 0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_extraction_keeps_broadcast() {
        let dir = tempfile::TempDir::new().unwrap();
        let clock = MockClock::new();
        let api = Arc::new(MockLiveApi::new());
        let coordinator = with_fake_ffmpeg(
            coordinator(api.clone(), clock.clone()),
            dir.path(),
            "echo 'Invalid data found when processing input' >&2\nexit 1",
            30,
        );

        let handle = coordinator.create(&plan_in(&clock, 5)).await.unwrap();
        assert_eq!(handle.state(), BroadcastState::Created);
        assert_eq!(thumbnail_and_delete_calls(&api).await, (0, 0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rejected_thumbnail_keeps_broadcast() {
        let dir = tempfile::TempDir::new().unwrap();
        let clock = MockClock::new();
        let api = Arc::new(MockLiveApi::new());
        api.fail_operation("set_thumbnail", u32::MAX).await;
        let coordinator = with_fake_ffmpeg(
            coordinator(api.clone(), clock.clone()),
            dir.path(),
            super::super::thumbnail::test_support::WRITE_LAST_ARG,
            30,
        );

        let plan = plan_in(&clock, 5);
        let handle = coordinator.create(&plan).await.unwrap();
        assert_eq!(handle.state(), BroadcastState::Created);
        assert_eq!(thumbnail_and_delete_calls(&api).await, (1, 0));
        // The grabbed frame is removed either way.
        let frame = dir.path().join("thumbs").join(format!("{}.jpg", plan.short_id()));
        assert!(!frame.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_extraction_does_not_block_create() {
        let dir = tempfile::TempDir::new().unwrap();
        let clock = MockClock::new();
        let api = Arc::new(MockLiveApi::new());
        let coordinator = with_fake_ffmpeg(
            coordinator(api.clone(), clock.clone()),
            dir.path(),
            "exec sleep 3600",
            1,
        );

        let started = std::time::Instant::now();
        let handle = tokio::time::timeout(
            Duration::from_secs(20),
            coordinator.create(&plan_in(&clock, 5)),
        )
        .await
        .expect("create hung on the thumbnail")
        .unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(handle.state(), BroadcastState::Created);
        assert_eq!(thumbnail_and_delete_calls(&api).await, (0, 0));
    }
}
