//! Error types for the encoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the encoder supervisor.
///
/// A single encoder crash is not an error: it is handled by a restart. These
/// variants describe supervisor-level conditions that end the session.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// Encoder binary not found.
    #[error("encoder binary not found at path: {path}")]
    BinaryNotFound { path: PathBuf },

    /// The ingest URL cannot be used as an output target.
    #[error("ingest URL rejected: {reason}")]
    IngestRejected { reason: String },

    /// The session has nothing to play.
    #[error("empty audio queue")]
    EmptyAudioQueue,

    /// Spawning the process failed.
    #[error("failed to spawn encoder: {0}")]
    SpawnFailed(String),

    /// The configured restart cap was reached.
    #[error("encoder restart limit of {limit} reached")]
    RestartLimitExceeded { limit: u32 },

    /// Operation on an encoder unit that was already stopped.
    #[error("encoder unit already stopped")]
    Stopped,

    /// Failed to prepare per-session files (playlist, FIFO).
    #[error("failed to prepare session file {path}: {reason}")]
    SessionFile { path: PathBuf, reason: String },

    /// I/O error while managing the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EncoderError {
    pub fn session_file(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::SessionFile {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
