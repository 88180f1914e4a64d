//! Mock live platform API for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::lifecycle::{
    BroadcastRequest, BroadcastState, IngestEndpoint, IngestStatus, LiveApi, LiveApiError,
    StreamRequest,
};

/// A recorded API call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveApiCall {
    CreateBroadcast {
        title: String,
        scheduled_start: DateTime<Utc>,
    },
    CreateStream,
    Bind {
        broadcast_id: String,
        stream_id: String,
    },
    SetThumbnail {
        broadcast_id: String,
    },
    StreamStatus {
        stream_id: String,
    },
    Transition {
        broadcast_id: String,
        target: BroadcastState,
    },
    DeleteBroadcast {
        broadcast_id: String,
    },
}

/// A transition the mock accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTransition {
    pub broadcast_id: String,
    pub target: BroadcastState,
    /// When the transition was accepted.
    pub at: DateTime<Utc>,
}

/// Mock implementation of the LiveApi trait.
///
/// Provides controllable behavior for testing:
/// - Record every call for assertions
/// - Fail a named operation a given number of times
/// - Control after how many status polls a stream turns active
///
/// By default every operation succeeds and streams report active on the
/// first poll.
///
/// # Example
///
/// ```rust,ignore
/// use airloop_core::testing::{MockLiveApi, LiveApiCall};
///
/// let api = MockLiveApi::new();
/// api.fail_operation("bind", 1).await;
///
/// // ... drive a coordinator ...
///
/// assert_eq!(api.count(|c| matches!(c, LiveApiCall::Bind { .. })).await, 2);
/// ```
pub struct MockLiveApi {
    /// Recorded calls, failed attempts included.
    calls: Arc<RwLock<Vec<LiveApiCall>>>,
    /// Accepted transitions.
    transitions: Arc<RwLock<Vec<RecordedTransition>>>,
    /// Remaining injected failures per operation name.
    failures: Arc<RwLock<HashMap<String, u32>>>,
    /// Polls before a stream reports active; `None` means never.
    active_after_polls: Arc<RwLock<Option<u32>>>,
    /// Status polls seen per stream.
    polls: Arc<RwLock<HashMap<String, u32>>>,
    /// Created broadcast ids.
    created: Arc<RwLock<Vec<String>>>,
    /// Deleted broadcast ids.
    deleted: Arc<RwLock<Vec<String>>>,
    /// Id counter for broadcasts and streams.
    next_id: Arc<RwLock<u32>>,
    /// Timestamps transitions; wall clock when unset.
    clock: Option<Arc<dyn Clock>>,
}

impl std::fmt::Debug for MockLiveApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLiveApi")
            .field("calls", &"<calls>")
            .field("transitions", &"<transitions>")
            .field("clock", &self.clock.is_some())
            .finish()
    }
}

impl Default for MockLiveApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLiveApi {
    /// Create a new mock API where everything succeeds.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            transitions: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            active_after_polls: Arc::new(RwLock::new(Some(1))),
            polls: Arc::new(RwLock::new(HashMap::new())),
            created: Arc::new(RwLock::new(Vec::new())),
            deleted: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(RwLock::new(0)),
            clock: None,
        }
    }

    /// Stamp accepted transitions with `clock` instead of the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Make the next `times` calls of `operation` fail with a server error.
    ///
    /// Operation names match the trait methods: `create_broadcast`,
    /// `create_stream`, `bind`, `set_thumbnail`, `stream_status`,
    /// `transition`, `delete_broadcast`.
    pub async fn fail_operation(&self, operation: &str, times: u32) {
        self.failures
            .write()
            .await
            .insert(operation.to_string(), times);
    }

    /// Stop injecting failures.
    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    /// Streams report active from poll number `polls` on; `None` never.
    pub async fn set_active_after_polls(&self, polls: Option<u32>) {
        *self.active_after_polls.write().await = polls;
    }

    /// Get all recorded calls.
    pub async fn calls(&self) -> Vec<LiveApiCall> {
        self.calls.read().await.clone()
    }

    /// Count recorded calls matching `predicate`.
    pub async fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&LiveApiCall) -> bool,
    {
        self.calls.read().await.iter().filter(|c| predicate(c)).count()
    }

    /// Get accepted transitions in order.
    pub async fn transition_log(&self) -> Vec<RecordedTransition> {
        self.transitions.read().await.clone()
    }

    /// Number of accepted transitions to `target`, across all broadcasts.
    pub async fn transitions_to(&self, target: BroadcastState) -> usize {
        self.transitions
            .read()
            .await
            .iter()
            .filter(|t| t.target == target)
            .count()
    }

    /// Accepted transition targets of one broadcast, in order.
    pub async fn transitions_of(&self, broadcast_id: &str) -> Vec<BroadcastState> {
        self.transitions
            .read()
            .await
            .iter()
            .filter(|t| t.broadcast_id == broadcast_id)
            .map(|t| t.target)
            .collect()
    }

    /// Ids of broadcasts created so far.
    pub async fn created_broadcasts(&self) -> Vec<String> {
        self.created.read().await.clone()
    }

    /// Ids of deleted broadcasts.
    pub async fn deleted_broadcasts(&self) -> Vec<String> {
        self.deleted.read().await.clone()
    }

    async fn record(&self, call: LiveApiCall, operation: &str) -> Result<(), LiveApiError> {
        self.calls.write().await.push(call);

        let mut failures = self.failures.write().await;
        if let Some(remaining) = failures.get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(LiveApiError::Api {
                    status: 500,
                    message: format!("injected {} failure", operation),
                });
            }
        }
        Ok(())
    }

    async fn next_id(&self) -> u32 {
        let mut next = self.next_id.write().await;
        *next += 1;
        *next
    }

    fn now(&self) -> DateTime<Utc> {
        match &self.clock {
            Some(clock) => clock.now(),
            None => Utc::now(),
        }
    }
}

#[async_trait]
impl LiveApi for MockLiveApi {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_broadcast(&self, request: &BroadcastRequest) -> Result<String, LiveApiError> {
        self.record(
            LiveApiCall::CreateBroadcast {
                title: request.title.clone(),
                scheduled_start: request.scheduled_start,
            },
            "create_broadcast",
        )
        .await?;
        let id = format!("bcast-{}", self.next_id().await);
        self.created.write().await.push(id.clone());
        Ok(id)
    }

    async fn create_stream(&self, _request: &StreamRequest) -> Result<IngestEndpoint, LiveApiError> {
        self.record(LiveApiCall::CreateStream, "create_stream").await?;
        let n = self.next_id().await;
        Ok(IngestEndpoint {
            stream_id: format!("stream-{}", n),
            ingest_url: format!("rtmp://a.rtmp.youtube.com/live2/key-{}", n),
        })
    }

    async fn bind(&self, broadcast_id: &str, stream_id: &str) -> Result<(), LiveApiError> {
        self.record(
            LiveApiCall::Bind {
                broadcast_id: broadcast_id.to_string(),
                stream_id: stream_id.to_string(),
            },
            "bind",
        )
        .await
    }

    async fn set_thumbnail(&self, broadcast_id: &str, _image: &Path) -> Result<(), LiveApiError> {
        self.record(
            LiveApiCall::SetThumbnail {
                broadcast_id: broadcast_id.to_string(),
            },
            "set_thumbnail",
        )
        .await
    }

    async fn stream_status(&self, stream_id: &str) -> Result<IngestStatus, LiveApiError> {
        self.record(
            LiveApiCall::StreamStatus {
                stream_id: stream_id.to_string(),
            },
            "stream_status",
        )
        .await?;

        let polls = {
            let mut polls = self.polls.write().await;
            let count = polls.entry(stream_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        match *self.active_after_polls.read().await {
            Some(threshold) if polls >= threshold => Ok(IngestStatus::Active),
            _ => Ok(IngestStatus::Ready),
        }
    }

    async fn transition(
        &self,
        broadcast_id: &str,
        target: BroadcastState,
    ) -> Result<(), LiveApiError> {
        self.record(
            LiveApiCall::Transition {
                broadcast_id: broadcast_id.to_string(),
                target,
            },
            "transition",
        )
        .await?;

        let at = self.now();
        self.transitions.write().await.push(RecordedTransition {
            broadcast_id: broadcast_id.to_string(),
            target,
            at,
        });
        Ok(())
    }

    async fn delete_broadcast(&self, broadcast_id: &str) -> Result<(), LiveApiError> {
        self.record(
            LiveApiCall::DeleteBroadcast {
                broadcast_id: broadcast_id.to_string(),
            },
            "delete_broadcast",
        )
        .await?;
        self.deleted.write().await.push(broadcast_id.to_string());
        Ok(())
    }
}
