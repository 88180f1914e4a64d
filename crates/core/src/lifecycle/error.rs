//! Error types for the lifecycle module.

use thiserror::Error;

use super::types::BroadcastState;

/// Errors from the remote live API.
#[derive(Debug, Error)]
pub enum LiveApiError {
    /// Network-level failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Credentials missing.
    #[error("live API not configured: {0}")]
    NotConfigured(String),

    /// Token exchange rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Non-success response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The platform does not know the object.
    #[error("not found: {0}")]
    NotFound(String),

    /// Reading a local file for upload failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while driving a broadcast through its lifecycle.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Api(#[from] LiveApiError),

    /// The ingest stream never reported active within the poll budget.
    #[error("ingest stream not active after {attempts} polls")]
    IngestNotActive { attempts: u32 },

    /// A state transition was refused or kept failing.
    #[error("transition to {target} failed")]
    TransitionFailed { target: BroadcastState },

    /// Thumbnail extraction failed.
    #[error("thumbnail extraction failed: {0}")]
    Thumbnail(String),
}
