//! API tests against a scheduler running mocked sessions.
//!
//! Time is paused, so a whole session plays out in milliseconds.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use airloop_core::BroadcastState;

use common::TestFixture;

#[tokio::test(start_paused = true)]
async fn test_status_before_start() {
    let fixture = TestFixture::new(600);

    let response = fixture.get("/api/v1/status").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["scheduler_configured"], true);
    assert_eq!(response.body["running"], false);
    assert_eq!(response.body["cycle_state"], "idle");
    assert!(response.body["current_session"].is_null());
}

#[tokio::test(start_paused = true)]
async fn test_status_reports_live_session() {
    let fixture = TestFixture::new(600);
    fixture.scheduler.start().await;

    // Live one minute after creation; well inside the session here.
    tokio::time::sleep(Duration::from_secs(120)).await;

    let response = fixture.get("/api/v1/status").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["running"], true);
    assert_eq!(response.body["cycle_state"], "running");
    assert_eq!(response.body["cycles"], 1);

    let session = &response.body["current_session"];
    let created = fixture.api.created_broadcasts().await;
    assert_eq!(created.len(), 1);
    assert_eq!(session["broadcast_id"], created[0].as_str());
    assert_eq!(session["broadcast_state"], "live");
    assert_eq!(session["restart_count"], 0);

    fixture.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_finalizes_live_session() {
    let fixture = TestFixture::new(600);
    fixture.scheduler.start().await;
    tokio::time::sleep(Duration::from_secs(120)).await;

    fixture.scheduler.stop().await;

    let response = fixture.get("/api/v1/status").await;
    assert_eq!(response.body["running"], false);
    assert_eq!(response.body["cycle_state"], "idle");
    assert!(response.body["current_session"].is_null());
    assert!(!response.body["last_report"].is_null());

    assert_eq!(fixture.api.transitions_to(BroadcastState::Complete).await, 1);
    assert_eq!(fixture.supervisor.stop_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_after_completed_session() {
    let fixture = TestFixture::new(600);
    fixture.scheduler.start().await;

    // Live at ~60s, complete at ~660s, then a 30s cooldown.
    tokio::time::sleep(Duration::from_secs(670)).await;

    let response = fixture.get("/api/v1/status").await;
    assert_eq!(response.body["cycle_state"], "cooldown");
    assert_eq!(response.body["sessions_completed"], 1);
    assert_eq!(response.body["sessions_failed"], 0);
    assert_eq!(
        response.body["last_report"]["outcome"]["outcome"],
        "completed"
    );
    assert!(!response.body["next_cycle_at"].is_null());

    fixture.scheduler.stop().await;
    assert_eq!(fixture.assets.load_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_empty_pool_reports_error() {
    let fixture = TestFixture::new(600);
    fixture.assets.set_pool(common::fixtures::media_pool(0, 0)).await;
    fixture.scheduler.start().await;

    tokio::time::sleep(Duration::from_secs(5)).await;

    let response = fixture.get("/api/v1/status").await;
    assert_eq!(response.body["cycle_state"], "cooldown");
    assert!(response.body["last_error"].is_string());
    assert!(fixture.api.created_broadcasts().await.is_empty());

    fixture.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new(600);

    let response = fixture.get("/metrics").await;
    assert_eq!(response.status, StatusCode::OK);

    let text = response.body.as_str().unwrap_or_default().to_string();
    assert!(text.contains("airloop_scheduler_running"));
    assert!(text.contains("airloop_sessions_started_total"));
}
