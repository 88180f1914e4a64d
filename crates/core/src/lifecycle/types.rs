//! Types for the broadcast lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a remote broadcast as tracked locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastState {
    Created,
    Testing,
    Live,
    Complete,
    Failed,
}

impl BroadcastState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BroadcastState::Created => "created",
            BroadcastState::Testing => "testing",
            BroadcastState::Live => "live",
            BroadcastState::Complete => "complete",
            BroadcastState::Failed => "failed",
        }
    }

    /// `Complete` and `Failed` are final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BroadcastState::Complete | BroadcastState::Failed)
    }

    /// Whether the remote platform accepts a move from `self` to `target`.
    pub fn can_transition_to(&self, target: BroadcastState) -> bool {
        use BroadcastState::*;
        matches!(
            (self, target),
            (Created, Testing)
                | (Testing, Live)
                | (Testing, Complete)
                | (Live, Complete)
        )
    }
}

impl fmt::Display for BroadcastState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ingest stream status as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Active,
    Ready,
    Inactive,
    Error,
    Other(String),
}

impl IngestStatus {
    pub fn from_api(status: &str) -> Self {
        match status {
            "active" => IngestStatus::Active,
            "ready" => IngestStatus::Ready,
            "inactive" => IngestStatus::Inactive,
            "error" => IngestStatus::Error,
            other => IngestStatus::Other(other.to_string()),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, IngestStatus::Active)
    }
}

/// Parameters for creating a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastRequest {
    pub title: String,
    pub description: String,
    pub scheduled_start: DateTime<Utc>,
    /// "public", "unlisted" or "private".
    pub privacy_status: String,
}

/// Parameters for creating an ingest stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub title: String,
    /// Resolution hint, e.g. "1080p".
    pub resolution: String,
    /// Frame rate hint, e.g. "30fps".
    pub frame_rate: String,
}

/// Ingest stream created on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestEndpoint {
    pub stream_id: String,
    /// Address plus stream key.
    pub ingest_url: String,
}

/// Local record of one session's broadcast.
///
/// Only the coordinator changes `state`.
#[derive(Debug, Clone)]
pub struct BroadcastHandle {
    broadcast_id: String,
    ingest_stream_id: String,
    ingest_url: String,
    scheduled_start: DateTime<Utc>,
    state: BroadcastState,
}

impl BroadcastHandle {
    pub(crate) fn new(
        broadcast_id: String,
        endpoint: IngestEndpoint,
        scheduled_start: DateTime<Utc>,
    ) -> Self {
        Self {
            broadcast_id,
            ingest_stream_id: endpoint.stream_id,
            ingest_url: endpoint.ingest_url,
            scheduled_start,
            state: BroadcastState::Created,
        }
    }

    pub fn broadcast_id(&self) -> &str {
        &self.broadcast_id
    }

    pub fn ingest_stream_id(&self) -> &str {
        &self.ingest_stream_id
    }

    pub fn ingest_url(&self) -> &str {
        &self.ingest_url
    }

    /// `Live` is never requested before this instant.
    pub fn scheduled_start(&self) -> DateTime<Utc> {
        self.scheduled_start
    }

    pub fn state(&self) -> BroadcastState {
        self.state
    }

    pub fn is_finalized(&self) -> bool {
        self.state.is_terminal()
    }

    pub(crate) fn set_state(&mut self, state: BroadcastState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_graph() {
        use BroadcastState::*;
        assert!(Created.can_transition_to(Testing));
        assert!(Testing.can_transition_to(Live));
        assert!(Live.can_transition_to(Complete));
        assert!(!Created.can_transition_to(Live));
        assert!(!Live.can_transition_to(Testing));
        assert!(!Complete.can_transition_to(Live));
        assert!(!Failed.can_transition_to(Complete));
    }

    #[test]
    fn test_terminal_states() {
        assert!(BroadcastState::Complete.is_terminal());
        assert!(BroadcastState::Failed.is_terminal());
        assert!(!BroadcastState::Live.is_terminal());
    }

    #[test]
    fn test_ingest_status_from_api() {
        assert!(IngestStatus::from_api("active").is_active());
        assert_eq!(IngestStatus::from_api("ready"), IngestStatus::Ready);
        assert_eq!(
            IngestStatus::from_api("noData"),
            IngestStatus::Other("noData".to_string())
        );
    }

    #[test]
    fn test_handle_starts_created() {
        let handle = BroadcastHandle::new(
            "b1".to_string(),
            IngestEndpoint {
                stream_id: "s1".to_string(),
                ingest_url: "rtmp://a.rtmp.youtube.com/live2/key".to_string(),
            },
            Utc::now(),
        );
        assert_eq!(handle.state(), BroadcastState::Created);
        assert_eq!(handle.broadcast_id(), "b1");
        assert_eq!(handle.ingest_stream_id(), "s1");
        assert!(!handle.is_finalized());
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&BroadcastState::Live).unwrap();
        assert_eq!(json, "\"live\"");
    }
}
