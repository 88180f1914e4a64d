//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the airloop server:
//! - HTTP request metrics (latency, counts)
//! - Scheduler and current session status (collected dynamically)
//!
//! Session, encoder and external service counters live in
//! `airloop_core::metrics` and are registered here as well.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "airloop_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("airloop_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "airloop_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Scheduler Metrics (collected dynamically)
// =============================================================================

/// Scheduler running state (1 = running, 0 = stopped).
pub static SCHEDULER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "airloop_scheduler_running",
        "Whether the session scheduler is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Whether a session is currently in flight.
pub static SESSION_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "airloop_session_active",
        "Whether a streaming session is currently in flight",
    )
    .unwrap()
});

/// Encoder restarts within the current session.
pub static SESSION_RESTARTS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "airloop_session_encoder_restarts",
        "Encoder restarts within the current session",
    )
    .unwrap()
});

/// Seconds since the server started.
pub static UPTIME_SECONDS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("airloop_uptime_seconds", "Seconds since the server started").unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Scheduler
    registry
        .register(Box::new(SCHEDULER_RUNNING.clone()))
        .unwrap();
    registry.register(Box::new(SESSION_ACTIVE.clone())).unwrap();
    registry
        .register(Box::new(SESSION_RESTARTS.clone()))
        .unwrap();
    registry.register(Box::new(UPTIME_SECONDS.clone())).unwrap();

    // Core metrics (scheduler, encoder, external services)
    for metric in airloop_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the scheduler as of the scrape.
pub async fn collect_dynamic_metrics(state: &AppState) {
    let status = state.scheduler_status().await;

    SCHEDULER_RUNNING.set(if status.running { 1 } else { 0 });
    match &status.current_session {
        Some(session) => {
            SESSION_ACTIVE.set(1);
            SESSION_RESTARTS.set(i64::from(session.restart_count));
        }
        None => {
            SESSION_ACTIVE.set(0);
            SESSION_RESTARTS.set(0);
        }
    }

    let uptime = chrono::Utc::now() - state.started_at();
    UPTIME_SECONDS.set(uptime.num_seconds().max(0));
}
