//! The remote live platform seam.

use async_trait::async_trait;
use std::path::Path;

use super::error::LiveApiError;
use super::types::{BroadcastRequest, BroadcastState, IngestEndpoint, IngestStatus, StreamRequest};

/// Operations the coordinator consumes from the live platform.
#[async_trait]
pub trait LiveApi: Send + Sync {
    /// Returns the name of this API implementation.
    fn name(&self) -> &str;

    /// Creates a broadcast and returns its id.
    async fn create_broadcast(&self, request: &BroadcastRequest) -> Result<String, LiveApiError>;

    /// Creates an ingest stream.
    async fn create_stream(&self, request: &StreamRequest) -> Result<IngestEndpoint, LiveApiError>;

    /// Binds a broadcast to an ingest stream.
    async fn bind(&self, broadcast_id: &str, stream_id: &str) -> Result<(), LiveApiError>;

    /// Uploads a JPEG thumbnail for the broadcast.
    async fn set_thumbnail(&self, broadcast_id: &str, image: &Path) -> Result<(), LiveApiError>;

    async fn stream_status(&self, stream_id: &str) -> Result<IngestStatus, LiveApiError>;

    /// Requests a state transition. Only `Testing`, `Live` and `Complete`
    /// are remote states; a transition the platform reports as redundant
    /// succeeds.
    async fn transition(
        &self,
        broadcast_id: &str,
        target: BroadcastState,
    ) -> Result<(), LiveApiError>;

    async fn delete_broadcast(&self, broadcast_id: &str) -> Result<(), LiveApiError>;
}
