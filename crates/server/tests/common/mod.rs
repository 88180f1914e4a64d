//! Common test utilities for in-process API testing with mocks.
//!
//! The fixture builds the real router over a scheduler wired to mocked
//! platform, encoder and asset source, so status endpoints can be checked
//! against a scheduler that actually runs sessions.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use airloop_core::{
    encoder::RestartPolicy,
    lifecycle::{BroadcastCoordinator, LifecycleConfig},
    retry::RetryPolicy,
    testing::{MockAssetSource, MockClock, MockEncoderSupervisor, MockLiveApi},
    Config, SchedulerConfig, SessionScheduler,
};
use airloop_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use airloop_core::testing::fixtures;

/// Test fixture with a mock-backed scheduler.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub scheduler: Arc<SessionScheduler>,
    pub api: Arc<MockLiveApi>,
    pub supervisor: Arc<MockEncoderSupervisor>,
    pub assets: Arc<MockAssetSource>,
    pub clock: MockClock,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture whose scheduler is built but not started.
    ///
    /// Sessions go live one minute after creation and last `session_secs`.
    pub fn new(session_secs: u64) -> Self {
        let clock = MockClock::new();
        let api = Arc::new(MockLiveApi::new().with_clock(Arc::new(clock.clone())));
        let supervisor = Arc::new(MockEncoderSupervisor::new());
        let assets = Arc::new(MockAssetSource::new(fixtures::media_pool(2, 5)));

        let lifecycle = LifecycleConfig {
            scheduled_start_delay_secs: 60,
            encoder_lead_secs: 60,
            ingest_poll: RetryPolicy::new(5, Duration::from_secs(5)),
            api_retry: RetryPolicy::new(2, Duration::from_secs(1)),
            ..LifecycleConfig::default()
        };
        let coordinator = Arc::new(BroadcastCoordinator::new(
            api.clone(),
            Arc::new(clock.clone()),
            lifecycle,
        ));

        let scheduler_config = SchedulerConfig {
            session_duration_secs: session_secs,
            cooldown_secs: 30,
            failure_backoff_secs: 60,
            ..SchedulerConfig::default()
        };
        let scheduler = Arc::new(SessionScheduler::new(
            scheduler_config.clone(),
            RestartPolicy {
                liveness_interval: Duration::from_secs(15),
                max_restarts: None,
            },
            assets.clone(),
            coordinator,
            supervisor.clone(),
            Arc::new(clock.clone()),
        ));

        let config = Config {
            scheduler: scheduler_config,
            ..Config::default()
        };
        let state = Arc::new(AppState::new(config, Some(scheduler.clone())));

        Self {
            router: create_router(state),
            scheduler,
            api,
            supervisor,
            assets,
            clock,
        }
    }

    /// Send a GET request to the in-process router.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
        };

        TestResponse { status, body }
    }
}
