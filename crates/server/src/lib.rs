//! HTTP surface of airloop: health, scheduler status, sanitized config and
//! Prometheus metrics.

pub mod api;
pub mod metrics;
pub mod state;
