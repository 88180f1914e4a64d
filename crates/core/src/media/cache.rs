//! Content-addressed media cache.
//!
//! A source URL maps to `<cache_dir>/<md5(url)>.<ext>`. Lookups are "create if
//! absent": a file already present under its key is returned as-is, so
//! repeated resolutions download at most once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Url};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::config::{EvictionPolicy, MediaConfig};
use super::error::FetchError;
use super::types::{MediaAsset, MediaKind};
use crate::metrics;

/// Outcome of an eviction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub removed: Vec<PathBuf>,
    pub freed_bytes: u64,
}

/// Resolves source URLs to local files.
#[async_trait]
pub trait MediaCache: Send + Sync {
    /// Resolve `url` to a cached local file, downloading it on a miss.
    async fn resolve(&self, url: &str, kind: MediaKind) -> Result<MediaAsset, FetchError>;

    /// Apply the eviction policy, never touching `protected` paths.
    async fn evict(&self, protected: &[PathBuf]) -> Result<EvictionReport, FetchError>;
}

/// Rewrite share links into their direct-download form.
///
/// Google Drive "open"/"view" links serve an HTML page; the `uc` endpoint
/// serves the file itself.
pub fn normalize_source_url(url: &str) -> String {
    if url.contains("drive.google.com") {
        if let Some(rest) = url.split("id=").nth(1) {
            let file_id = rest.split('&').next().unwrap_or(rest);
            return format!(
                "https://drive.google.com/uc?export=download&id={}&confirm=t",
                file_id
            );
        }
    }
    url.to_string()
}

/// Cache key for a (normalized) source URL.
pub fn content_key(url: &str) -> String {
    format!("{:x}", md5::compute(url.as_bytes()))
}

/// File extension for a source URL, falling back to the kind's default.
pub fn extension_for(url: &str, kind: MediaKind) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
        })
        .filter(|e| !e.is_empty() && e.len() <= 5)
        .unwrap_or_else(|| kind.default_extension().to_string())
}

/// Display name derived from the URL's last path segment.
fn display_name_for(url: &str, fallback: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.path_segments().and_then(|s| s.last().map(str::to_string)))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// HTTP-backed cache rooted at a local directory.
pub struct HttpMediaCache {
    client: Client,
    cache_dir: PathBuf,
    eviction: EvictionPolicy,
    /// Per-key locks so concurrent resolutions of one URL share a download.
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl HttpMediaCache {
    /// Create a cache from configuration. The directory is created lazily.
    pub fn new(config: &MediaConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            cache_dir: config.cache_dir.clone(),
            eviction: config.eviction.clone(),
            inflight: Mutex::new(HashMap::new()),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Local path a URL maps to, whether or not it is cached yet.
    pub fn path_for(&self, url: &str, kind: MediaKind) -> PathBuf {
        let normalized = normalize_source_url(url);
        self.cache_dir.join(format!(
            "{}.{}",
            content_key(&normalized),
            extension_for(&normalized, kind)
        ))
    }

    async fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut inflight = self.inflight.lock().await;
        Arc::clone(
            inflight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Drops the caller's handle on a key lock and forgets the key once no
    /// other resolution holds it.
    async fn release_key(&self, key: &str, lock: Arc<Mutex<()>>) {
        let mut inflight = self.inflight.lock().await;
        drop(lock);
        if inflight
            .get(key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            inflight.remove(key);
        }
    }

    #[cfg(test)]
    async fn inflight_keys(&self) -> usize {
        self.inflight.lock().await.len()
    }

    /// Hit check and download for one key. Callers hold the key lock.
    async fn fetch_locked(
        &self,
        url: &str,
        normalized: &str,
        asset: MediaAsset,
    ) -> Result<MediaAsset, FetchError> {
        let local_path = &asset.local_path;
        if tokio::fs::try_exists(local_path).await.unwrap_or(false) {
            debug!("Cache hit for {} -> {:?}", url, local_path);
            metrics::MEDIA_CACHE_HITS.inc();
            return Ok(asset);
        }

        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| FetchError::storage(&self.cache_dir, e))?;

        info!("Downloading {} {}", asset.kind, normalized);
        match self.download(normalized, local_path).await {
            Ok(bytes) => {
                metrics::MEDIA_DOWNLOADS.with_label_values(&["success"]).inc();
                info!("Cached {} ({} bytes) at {:?}", normalized, bytes, local_path);
                Ok(asset)
            }
            Err(e) => {
                metrics::MEDIA_DOWNLOADS.with_label_values(&["failed"]).inc();
                Err(e)
            }
        }
    }

    /// Stream `url` into `dest` through a temporary `.part` file.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let part = dest.with_extension(format!(
            "{}.part",
            dest.extension().and_then(|e| e.to_str()).unwrap_or("bin")
        ));
        let mut file = tokio::fs::File::create(&part)
            .await
            .map_err(|e| FetchError::storage(&part, e))?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let _ = tokio::fs::remove_file(&part).await;
                    return Err(e.into());
                }
            };
            if let Err(e) = file.write_all(&chunk).await {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(FetchError::storage(&part, e));
            }
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| FetchError::storage(&part, e))?;
        drop(file);

        tokio::fs::rename(&part, dest)
            .await
            .map_err(|e| FetchError::storage(dest, e))?;
        Ok(written)
    }

    async fn cached_files(&self) -> Result<Vec<(PathBuf, u64, SystemTime)>, FetchError> {
        let mut files = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(FetchError::storage(&self.cache_dir, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FetchError::storage(&self.cache_dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "part") {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((path, meta.len(), modified));
        }
        Ok(files)
    }
}

#[async_trait]
impl MediaCache for HttpMediaCache {
    async fn resolve(&self, url: &str, kind: MediaKind) -> Result<MediaAsset, FetchError> {
        let normalized = normalize_source_url(url);
        Url::parse(&normalized).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

        let id = content_key(&normalized);
        let local_path = self.path_for(url, kind);
        let asset = MediaAsset {
            id: id.clone(),
            kind,
            local_path,
            display_name: display_name_for(&normalized, &id),
            source_url: normalized.clone(),
        };

        let lock = self.key_lock(&id).await;
        let result = {
            let _guard = lock.lock().await;
            self.fetch_locked(url, &normalized, asset).await
        };
        self.release_key(&id, lock).await;
        result
    }

    async fn evict(&self, protected: &[PathBuf]) -> Result<EvictionReport, FetchError> {
        let mut report = EvictionReport::default();
        if self.eviction.is_unbounded() {
            return Ok(report);
        }

        let mut files = self.cached_files().await?;
        // Oldest first
        files.sort_by_key(|(_, _, modified)| *modified);

        let now = SystemTime::now();
        let mut total: u64 = files.iter().map(|(_, len, _)| len).sum();

        for (path, len, modified) in files {
            if protected.iter().any(|p| p == &path) {
                continue;
            }

            let too_old = self.eviction.max_age_secs.is_some_and(|max_age| {
                now.duration_since(modified)
                    .map(|age| age > Duration::from_secs(max_age))
                    .unwrap_or(false)
            });
            let over_size = self.eviction.max_bytes.is_some_and(|max| total > max);

            if !too_old && !over_size {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Evicted {:?} ({} bytes)", path, len);
                    metrics::MEDIA_EVICTIONS.inc();
                    total = total.saturating_sub(len);
                    report.freed_bytes += len;
                    report.removed.push(path);
                }
                Err(e) => warn!("Failed to evict {:?}: {}", path, e),
            }
        }

        if !report.removed.is_empty() {
            info!(
                "Cache eviction removed {} files ({} bytes)",
                report.removed.len(),
                report.freed_bytes
            );
        }
        Ok(report)
    }
}
