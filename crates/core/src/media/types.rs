//! Media asset types.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Kind of cached media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
}

impl MediaKind {
    /// Extension used when the source URL carries none.
    pub fn default_extension(&self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
            MediaKind::Image => "jpg",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Image => "image",
        };
        f.write_str(s)
    }
}

/// A media file resolved into the local cache.
///
/// Immutable once created; lives as long as the file in the cache directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
    /// Hex digest of the (normalized) source URL.
    pub id: String,
    pub kind: MediaKind,
    pub local_path: PathBuf,
    pub display_name: String,
    pub source_url: String,
}

impl MediaAsset {
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }
}

/// Assets available for one scheduler cycle.
///
/// Only assets that resolved to a local file are ever placed in a pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaPool {
    pub visuals: Vec<MediaAsset>,
    pub audio: Vec<MediaAsset>,
}

impl MediaPool {
    pub fn new(visuals: Vec<MediaAsset>, audio: Vec<MediaAsset>) -> Self {
        Self { visuals, audio }
    }

    /// A pool can run a session only with at least one visual and one track.
    pub fn is_usable(&self) -> bool {
        !self.visuals.is_empty() && !self.audio.is_empty()
    }

    /// Paths referenced by this pool (protected from cache eviction).
    pub fn paths(&self) -> Vec<PathBuf> {
        self.visuals
            .iter()
            .chain(self.audio.iter())
            .map(|a| a.local_path.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(id: &str, kind: MediaKind) -> MediaAsset {
        MediaAsset {
            id: id.to_string(),
            kind,
            local_path: PathBuf::from(format!("/cache/{}.{}", id, kind.default_extension())),
            display_name: id.to_string(),
            source_url: format!("https://example.com/{}", id),
        }
    }

    #[test]
    fn test_pool_usable_requires_both_kinds() {
        assert!(!MediaPool::default().is_usable());
        assert!(!MediaPool::new(vec![asset("v", MediaKind::Video)], vec![]).is_usable());
        assert!(!MediaPool::new(vec![], vec![asset("a", MediaKind::Audio)]).is_usable());
        assert!(MediaPool::new(
            vec![asset("v", MediaKind::Video)],
            vec![asset("a", MediaKind::Audio)]
        )
        .is_usable());
    }

    #[test]
    fn test_pool_paths() {
        let pool = MediaPool::new(
            vec![asset("v", MediaKind::Video)],
            vec![asset("a", MediaKind::Audio), asset("b", MediaKind::Audio)],
        );
        let paths = pool.paths();
        assert_eq!(paths.len(), 3);
        assert!(paths.contains(&PathBuf::from("/cache/a.mp3")));
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(serde_json::to_string(&MediaKind::Video).unwrap(), "\"video\"");
        assert_eq!(MediaKind::Audio.to_string(), "audio");
    }
}
