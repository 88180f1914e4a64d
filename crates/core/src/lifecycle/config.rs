//! Configuration for the live API client and the lifecycle coordinator.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Credentials and endpoints for the remote live API.
///
/// The raw `YOUTUBE_CLIENT_ID`, `YOUTUBE_CLIENT_SECRET` and
/// `YOUTUBE_REFRESH_TOKEN` environment variables map onto this section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveApiConfig {
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    /// Long-lived credential exchanged for access tokens.
    #[serde(default)]
    pub refresh_token: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base for media uploads (thumbnails).
    #[serde(default = "default_upload_base_url")]
    pub upload_base_url: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_upload_base_url() -> String {
    "https://www.googleapis.com/upload/youtube/v3".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for LiveApiConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            api_base_url: default_api_base_url(),
            upload_base_url: default_upload_base_url(),
            token_url: default_token_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl LiveApiConfig {
    /// All three credentials are present.
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty()
            && !self.client_secret.is_empty()
            && !self.refresh_token.is_empty()
    }
}

/// Thumbnail extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Offset into the visual the frame is taken from.
    #[serde(default = "default_seek")]
    pub seek_secs: u64,

    #[serde(default = "default_thumb_width")]
    pub width: u32,

    #[serde(default = "default_thumb_height")]
    pub height: u32,

    /// Upper bound on the frame grab; a slower extraction is skipped.
    #[serde(default = "default_thumb_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_seek() -> u64 {
    10
}

fn default_thumb_width() -> u32 {
    1280
}

fn default_thumb_height() -> u32 {
    720
}

fn default_thumb_timeout() -> u64 {
    30
}

impl ThumbnailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            seek_secs: default_seek(),
            width: default_thumb_width(),
            height: default_thumb_height(),
            timeout_secs: default_thumb_timeout(),
        }
    }
}

/// Timing and broadcast settings for the lifecycle coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Delay between cycle start and the announced scheduled start.
    #[serde(default = "default_start_delay")]
    pub scheduled_start_delay_secs: u64,

    /// How long before the scheduled start the encoder is launched.
    #[serde(default = "default_encoder_lead")]
    pub encoder_lead_secs: u64,

    /// Ingest activation poll budget.
    #[serde(default = "default_ingest_poll")]
    pub ingest_poll: RetryPolicy,

    /// Retry budget for individual API calls and transitions.
    #[serde(default)]
    pub api_retry: RetryPolicy,

    #[serde(default = "default_privacy")]
    pub privacy_status: String,

    #[serde(default = "default_resolution")]
    pub stream_resolution: String,

    #[serde(default = "default_stream_frame_rate")]
    pub stream_frame_rate: String,

    #[serde(default)]
    pub thumbnail: ThumbnailConfig,
}

fn default_start_delay() -> u64 {
    300
}

fn default_encoder_lead() -> u64 {
    300
}

fn default_ingest_poll() -> RetryPolicy {
    RetryPolicy::new(10, Duration::from_secs(5))
}

fn default_privacy() -> String {
    "public".to_string()
}

fn default_resolution() -> String {
    "1080p".to_string()
}

fn default_stream_frame_rate() -> String {
    "30fps".to_string()
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            scheduled_start_delay_secs: default_start_delay(),
            encoder_lead_secs: default_encoder_lead(),
            ingest_poll: default_ingest_poll(),
            api_retry: RetryPolicy::default(),
            privacy_status: default_privacy(),
            stream_resolution: default_resolution(),
            stream_frame_rate: default_stream_frame_rate(),
            thumbnail: ThumbnailConfig::default(),
        }
    }
}

impl LifecycleConfig {
    pub fn scheduled_start_delay(&self) -> Duration {
        Duration::from_secs(self.scheduled_start_delay_secs)
    }

    pub fn encoder_lead(&self) -> Duration {
        Duration::from_secs(self.encoder_lead_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LifecycleConfig::default();
        assert_eq!(config.scheduled_start_delay(), Duration::from_secs(300));
        assert_eq!(config.ingest_poll.attempts(), 10);
        assert_eq!(config.ingest_poll.interval(), Duration::from_secs(5));
        assert_eq!(config.privacy_status, "public");
        assert!(config.thumbnail.enabled);
    }

    #[test]
    fn test_live_api_configured() {
        let mut config = LiveApiConfig::default();
        assert!(!config.is_configured());
        config.client_id = "id".to_string();
        config.client_secret = "secret".to_string();
        config.refresh_token = "token".to_string();
        assert!(config.is_configured());
    }

    #[test]
    fn test_deserialize_nested_policy() {
        let toml = r#"
            encoder_lead_secs = 60

            [ingest_poll]
            max_attempts = 4
            interval_ms = 2000

            [thumbnail]
            enabled = false
        "#;
        let config: LifecycleConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.encoder_lead(), Duration::from_secs(60));
        assert_eq!(config.ingest_poll.attempts(), 4);
        assert!(!config.thumbnail.enabled);
        assert_eq!(config.thumbnail.seek_secs, 10);
        assert_eq!(config.thumbnail.timeout(), Duration::from_secs(30));
    }
}
