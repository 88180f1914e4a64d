//! Error types for the media module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while fetching media or the asset manifest.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote answered with a non-success status.
    #[error("unexpected HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    /// The source URL could not be parsed.
    #[error("invalid source URL: {0}")]
    InvalidUrl(String),

    /// The manifest did not have the expected structure.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// Local storage failure.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}
