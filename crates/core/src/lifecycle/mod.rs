//! Broadcast lifecycle: creates the remote broadcast and ingest stream and
//! drives `Created → Testing → Live → Complete`, or `Failed`.

mod api;
mod config;
mod coordinator;
mod error;
mod thumbnail;
mod types;
mod youtube;

pub use api::LiveApi;
pub use config::{LifecycleConfig, LiveApiConfig, ThumbnailConfig};
pub use coordinator::BroadcastCoordinator;
pub use error::{LifecycleError, LiveApiError};
pub use thumbnail::Thumbnailer;
pub use types::{
    BroadcastHandle, BroadcastRequest, BroadcastState, IngestEndpoint, IngestStatus,
    StreamRequest,
};
pub use youtube::YouTubeLiveApi;
