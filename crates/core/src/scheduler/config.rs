//! Configuration for the session scheduler.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the session scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the scheduler loop starts with the server.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Length of the live phase of each session.
    #[serde(default = "default_session_duration")]
    pub session_duration_secs: u64,

    /// Pause after a session ended normally.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Flat pause after any failure.
    #[serde(default = "default_failure_backoff")]
    pub failure_backoff_secs: u64,

    /// Average track length used to size the audio queue.
    #[serde(default = "default_estimated_track")]
    pub estimated_track_secs: u64,

    /// Broadcast description.
    #[serde(default = "default_description")]
    pub description: String,
}

fn default_enabled() -> bool {
    true
}

fn default_session_duration() -> u64 {
    8 * 3600
}

fn default_cooldown() -> u64 {
    300
}

fn default_failure_backoff() -> u64 {
    60
}

fn default_estimated_track() -> u64 {
    240
}

fn default_description() -> String {
    "Relaxing, instrumental and ambient music around the clock. \
     Put it on while you work, study, meditate or unwind."
        .to_string()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            session_duration_secs: default_session_duration(),
            cooldown_secs: default_cooldown(),
            failure_backoff_secs: default_failure_backoff(),
            estimated_track_secs: default_estimated_track(),
            description: default_description(),
        }
    }
}

impl SchedulerConfig {
    pub fn session_duration(&self) -> Duration {
        Duration::from_secs(self.session_duration_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_secs(self.failure_backoff_secs)
    }

    /// Number of queue entries needed to cover one session.
    pub fn queue_length(&self) -> usize {
        let track = self.estimated_track_secs.max(1);
        (self.session_duration_secs / track).max(1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert!(config.enabled);
        assert_eq!(config.session_duration(), Duration::from_secs(28800));
        assert_eq!(config.cooldown(), Duration::from_secs(300));
        assert_eq!(config.failure_backoff(), Duration::from_secs(60));
        assert_eq!(config.queue_length(), 120);
    }

    #[test]
    fn test_queue_length_never_zero() {
        let config = SchedulerConfig {
            session_duration_secs: 10,
            estimated_track_secs: 0,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.queue_length(), 10);

        let config = SchedulerConfig {
            session_duration_secs: 0,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.queue_length(), 1);
    }
}
