//! The immutable plan for one streaming session.

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::media::MediaAsset;

/// Everything a session needs, fixed at cycle start.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub id: Uuid,
    /// Looped video or still image shown for the whole session.
    pub visual: MediaAsset,
    /// Ordered audio queue; entries may repeat. Looped if exhausted.
    pub audio_queue: Vec<MediaAsset>,
    pub title: String,
    pub description: String,
    /// Scheduled start announced to the platform.
    pub planned_start: DateTime<Utc>,
    /// Hard wall-clock bound of the live phase.
    pub duration_bound: Duration,
}

impl SessionPlan {
    /// Short identifier used in logs and per-session file names.
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}
