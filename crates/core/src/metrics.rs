//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Session scheduler (cycles, session outcomes, current cycle state)
//! - Encoder supervisor (spawns, crash restarts)
//! - Remote live API and media cache (requests, downloads)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Sessions started total.
pub static SESSIONS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("airloop_sessions_started_total", "Total sessions started").unwrap()
});

/// Sessions finished total by outcome.
pub static SESSIONS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("airloop_sessions_finished_total", "Total sessions finished"),
        &["outcome"], // "completed", "failed", "cancelled"
    )
    .unwrap()
});

/// Session wall-clock duration in seconds.
pub static SESSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "airloop_session_duration_seconds",
            "Duration of streaming sessions",
        )
        .buckets(vec![
            60.0, 300.0, 900.0, 3600.0, 7200.0, 14400.0, 28800.0, 43200.0,
        ]),
        &["outcome"],
    )
    .unwrap()
});

/// Cycles deferred to cooldown because preparation failed.
pub static CYCLES_DEFERRED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "airloop_cycles_deferred_total",
            "Cycles aborted before a session could start",
        ),
        &["reason"], // "empty_pool", "asset_source"
    )
    .unwrap()
});

/// Current cycle state as a numeric code (0 idle, 1 preparing, 2 running, 3 cooldown).
pub static CYCLE_STATE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "airloop_cycle_state",
        "Current scheduler cycle state (0 idle, 1 preparing, 2 running, 3 cooldown)",
    )
    .unwrap()
});

// =============================================================================
// Encoder Metrics
// =============================================================================

/// Encoder processes spawned (initial starts and restarts).
pub static ENCODER_SPAWNS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("airloop_encoder_spawns_total", "Total encoder processes spawned").unwrap()
});

/// Encoder crash restarts.
pub static ENCODER_RESTARTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "airloop_encoder_restarts_total",
        "Total encoder restarts after an unexpected exit",
    )
    .unwrap()
});

/// Encoder stops that needed a force-kill after the graceful timeout.
pub static ENCODER_FORCE_KILLS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "airloop_encoder_force_kills_total",
        "Encoder stops that escalated to a force-kill",
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// Live API requests total.
pub static LIVE_API_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("airloop_live_api_requests_total", "Total remote live API requests"),
        &["operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

/// Broadcast state transitions requested.
pub static BROADCAST_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "airloop_broadcast_transitions_total",
            "Broadcast state transitions",
        ),
        &["to_state"],
    )
    .unwrap()
});

/// Media downloads by result.
pub static MEDIA_DOWNLOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("airloop_media_downloads_total", "Media cache downloads"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Media cache hits.
pub static MEDIA_CACHE_HITS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("airloop_media_cache_hits_total", "Media cache hits").unwrap()
});

/// Files removed by cache eviction.
pub static MEDIA_EVICTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "airloop_media_evictions_total",
        "Files removed from the media cache by eviction",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Scheduler
        Box::new(SESSIONS_STARTED.clone()),
        Box::new(SESSIONS_FINISHED.clone()),
        Box::new(SESSION_DURATION.clone()),
        Box::new(CYCLES_DEFERRED.clone()),
        Box::new(CYCLE_STATE.clone()),
        // Encoder
        Box::new(ENCODER_SPAWNS.clone()),
        Box::new(ENCODER_RESTARTS.clone()),
        Box::new(ENCODER_FORCE_KILLS.clone()),
        // External services
        Box::new(LIVE_API_REQUESTS.clone()),
        Box::new(BROADCAST_TRANSITIONS.clone()),
        Box::new(MEDIA_DOWNLOADS.clone()),
        Box::new(MEDIA_CACHE_HITS.clone()),
        Box::new(MEDIA_EVICTIONS.clone()),
    ]
}
