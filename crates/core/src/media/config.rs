//! Configuration for the media cache.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Media cache and manifest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// URL of the JSON manifest listing videos and music.
    #[serde(default)]
    pub manifest_url: String,

    /// Content-addressed cache directory.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Timeout for fetching the manifest, in seconds.
    #[serde(default = "default_manifest_timeout")]
    pub manifest_timeout_secs: u64,

    /// Timeout for a single media download, in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Cache eviction bounds. Unbounded by default.
    #[serde(default)]
    pub eviction: EvictionPolicy,
}

/// Size/age bounds applied to the cache directory.
///
/// Files referenced by the current pool are never evicted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionPolicy {
    /// Maximum total size of cached files, in bytes.
    #[serde(default)]
    pub max_bytes: Option<u64>,

    /// Maximum age of a cached file (by modification time), in seconds.
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

impl EvictionPolicy {
    pub fn is_unbounded(&self) -> bool {
        self.max_bytes.is_none() && self.max_age_secs.is_none()
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./media_cache")
}

fn default_manifest_timeout() -> u64 {
    20
}

fn default_download_timeout() -> u64 {
    600
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            manifest_url: String::new(),
            cache_dir: default_cache_dir(),
            manifest_timeout_secs: default_manifest_timeout(),
            download_timeout_secs: default_download_timeout(),
            eviction: EvictionPolicy::default(),
        }
    }
}

impl MediaConfig {
    /// Sets the cache directory.
    pub fn with_cache_dir(mut self, cache_dir: PathBuf) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    /// Sets the eviction policy.
    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MediaConfig::default();
        assert_eq!(config.cache_dir, PathBuf::from("./media_cache"));
        assert!(config.eviction.is_unbounded());
        assert!(config.manifest_url.is_empty());
    }

    #[test]
    fn test_deserialize_with_eviction() {
        let toml = r#"
            manifest_url = "https://example.com/media.json"
            cache_dir = "/var/cache/airloop"

            [eviction]
            max_bytes = 1073741824
        "#;
        let config: MediaConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.manifest_url, "https://example.com/media.json");
        assert_eq!(config.eviction.max_bytes, Some(1_073_741_824));
        assert_eq!(config.eviction.max_age_secs, None);
        assert!(!config.eviction.is_unbounded());
    }
}
