//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of all external service traits,
//! allowing whole sessions to be driven without a live platform, an encoder
//! binary or a media host.
//!
//! # Example
//!
//! ```rust,ignore
//! use airloop_core::testing::{fixtures, MockAssetSource, MockClock, MockEncoderSupervisor, MockLiveApi};
//!
//! let api = MockLiveApi::new();
//! let supervisor = MockEncoderSupervisor::new();
//! let assets = MockAssetSource::new(fixtures::media_pool(2, 5));
//! let clock = MockClock::new();
//!
//! // Script failures
//! api.set_active_after_polls(Some(3)).await;
//! supervisor.crash_on_probes(&[10]).await;
//!
//! // Wire into a SessionScheduler...
//! ```

mod mock_asset_source;
mod mock_clock;
mod mock_encoder;
mod mock_live_api;

pub use mock_asset_source::MockAssetSource;
pub use mock_clock::MockClock;
pub use mock_encoder::{mock_playlist_path, MockEncoder, MockEncoderSupervisor};
pub use mock_live_api::{LiveApiCall, MockLiveApi, RecordedTransition};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, Utc};
    use std::path::PathBuf;
    use std::time::Duration;
    use uuid::Uuid;

    use crate::media::{MediaAsset, MediaKind, MediaPool};
    use crate::plan::SessionPlan;

    /// A well-formed ingest URL.
    pub const INGEST_URL: &str = "rtmp://a.rtmp.youtube.com/live2/test-key";

    /// Create a test asset. The local path does not exist.
    pub fn media_asset(name: &str, kind: MediaKind) -> MediaAsset {
        let ext = kind.default_extension();
        MediaAsset {
            id: name.to_string(),
            kind,
            local_path: PathBuf::from(format!("/var/cache/airloop/{}.{}", name, ext)),
            display_name: name.to_string(),
            source_url: format!("https://media.example.com/{}.{}", name, ext),
        }
    }

    /// Create a pool of `visuals` videos and `tracks` audio tracks.
    pub fn media_pool(visuals: usize, tracks: usize) -> MediaPool {
        MediaPool::new(
            (1..=visuals)
                .map(|i| media_asset(&format!("visual-{}", i), MediaKind::Video))
                .collect(),
            (1..=tracks)
                .map(|i| media_asset(&format!("calm-piano-{}", i), MediaKind::Audio))
                .collect(),
        )
    }

    /// Create a plan with `tracks` queued tracks, starting in five minutes
    /// and bounded to eight hours.
    pub fn session_plan(tracks: usize) -> SessionPlan {
        let mut plan = session_plan_starting(
            Utc::now() + chrono::Duration::minutes(5),
            Duration::from_secs(8 * 3600),
        );
        plan.audio_queue = audio_queue(tracks);
        plan
    }

    /// Create a three-track plan with the given start and duration bound.
    pub fn session_plan_starting(
        planned_start: DateTime<Utc>,
        duration_bound: Duration,
    ) -> SessionPlan {
        SessionPlan {
            id: Uuid::new_v4(),
            visual: media_asset("visual-1", MediaKind::Video),
            audio_queue: audio_queue(3),
            title: "Relax Music • calm-piano-1 | Perfect for Studying 📚".to_string(),
            description: "Relaxing music, streamed around the clock.".to_string(),
            planned_start,
            duration_bound,
        }
    }

    /// Create `tracks` audio assets.
    pub fn audio_queue(tracks: usize) -> Vec<MediaAsset> {
        (1..=tracks)
            .map(|i| media_asset(&format!("calm-piano-{}", i), MediaKind::Audio))
            .collect()
    }
}
