//! Remote asset manifest and the asset-source seam consumed by the scheduler.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::cache::MediaCache;
use super::config::MediaConfig;
use super::error::FetchError;
use super::types::{MediaAsset, MediaKind, MediaPool};

/// One entry in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub url: String,
}

/// Manifest document: `{"videos": [...], "musica": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub videos: Vec<ManifestEntry>,
    #[serde(alias = "musica")]
    pub music: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn parse(body: &str) -> Result<Self, FetchError> {
        serde_json::from_str(body).map_err(|e| FetchError::InvalidManifest(e.to_string()))
    }
}

/// Provides the pool of resolved assets for a cycle.
#[async_trait]
pub trait AssetSource: Send + Sync {
    fn name(&self) -> &str;

    /// Load and resolve every asset. Entries that fail to resolve are left
    /// out of the pool; the pool may come back empty.
    async fn load_pool(&self) -> Result<MediaPool, FetchError>;
}

/// Asset source backed by a remote JSON manifest and the media cache.
pub struct ManifestAssetSource {
    client: Client,
    manifest_url: String,
    cache: Arc<dyn MediaCache>,
}

impl ManifestAssetSource {
    pub fn new(config: &MediaConfig, cache: Arc<dyn MediaCache>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.manifest_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            manifest_url: config.manifest_url.clone(),
            cache,
        })
    }

    /// Fetch and parse the manifest.
    pub async fn fetch_manifest(&self) -> Result<Manifest, FetchError> {
        info!("Fetching media manifest from {}", self.manifest_url);
        let response = self.client.get(&self.manifest_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.manifest_url.clone(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        Manifest::parse(&body)
    }

    async fn resolve_all(&self, entries: &[ManifestEntry], kind: MediaKind) -> Vec<MediaAsset> {
        let mut assets = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            info!(
                "Resolving {} {}/{}: {}",
                kind,
                i + 1,
                entries.len(),
                entry.name
            );
            match self.cache.resolve(&entry.url, kind).await {
                Ok(asset) => assets.push(asset.with_display_name(entry.name.clone())),
                Err(e) => warn!("Skipping {} '{}': {}", kind, entry.name, e),
            }
        }
        assets
    }
}

#[async_trait]
impl AssetSource for ManifestAssetSource {
    fn name(&self) -> &str {
        "manifest"
    }

    async fn load_pool(&self) -> Result<MediaPool, FetchError> {
        let manifest = self.fetch_manifest().await?;

        let visuals = self.resolve_all(&manifest.videos, MediaKind::Video).await;
        let audio = self.resolve_all(&manifest.music, MediaKind::Audio).await;
        let pool = MediaPool::new(visuals, audio);

        info!(
            "Media pool ready: {} visuals, {} tracks",
            pool.visuals.len(),
            pool.audio.len()
        );

        if let Err(e) = self.cache.evict(&pool.paths()).await {
            warn!("Cache eviction failed: {}", e);
        }

        Ok(pool)
    }
}
