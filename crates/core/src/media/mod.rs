//! Media cache: resolves source URLs to local files.
//!
//! The cache is content-addressed by a hash of the source URL, so resolving
//! the same URL twice returns the same path and downloads at most once. The
//! asset pool for each cycle comes from a remote JSON manifest resolved
//! through the cache.

mod cache;
mod config;
mod error;
mod manifest;
mod types;

pub use cache::{
    content_key, extension_for, normalize_source_url, EvictionReport, HttpMediaCache, MediaCache,
};
pub use config::{EvictionPolicy, MediaConfig};
pub use error::FetchError;
pub use manifest::{AssetSource, Manifest, ManifestAssetSource, ManifestEntry};
pub use types::{MediaAsset, MediaKind, MediaPool};
