//! Thumbnail extraction from the session's visual asset.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::config::ThumbnailConfig;
use super::error::LifecycleError;
use crate::media::{MediaAsset, MediaKind};

/// Grabs a single scaled frame with ffmpeg.
#[derive(Debug, Clone)]
pub struct Thumbnailer {
    ffmpeg_path: PathBuf,
    work_dir: PathBuf,
    config: ThumbnailConfig,
}

impl Thumbnailer {
    pub fn new(ffmpeg_path: PathBuf, work_dir: PathBuf, config: ThumbnailConfig) -> Self {
        Self {
            ffmpeg_path,
            work_dir,
            config,
        }
    }

    /// Arguments producing `output` from `visual`.
    pub fn build_args(&self, visual: &MediaAsset, output: &Path) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-loglevel".to_string(), "error".to_string()];

        // Stills have nothing to seek into.
        if visual.kind != MediaKind::Image {
            args.extend(["-ss".to_string(), self.config.seek_secs.to_string()]);
        }

        args.extend([
            "-i".to_string(),
            visual.local_path.to_string_lossy().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            format!("scale={}:{}", self.config.width, self.config.height),
            "-q:v".to_string(),
            "2".to_string(),
            output.to_string_lossy().to_string(),
        ]);
        args
    }

    /// Extracts a frame into the work dir and returns its path.
    pub async fn extract(&self, visual: &MediaAsset, name: &str) -> Result<PathBuf, LifecycleError> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| LifecycleError::Thumbnail(e.to_string()))?;

        let output = self.work_dir.join(format!("{}.jpg", name));
        let args = self.build_args(visual, &output);
        debug!("Extracting thumbnail: {:?} {:?}", self.ffmpeg_path, args);

        // The child is killed when the timed-out future is dropped.
        let run = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();
        let result = tokio::time::timeout(self.config.timeout(), run)
            .await
            .map_err(|_| {
                LifecycleError::Thumbnail(format!(
                    "ffmpeg did not finish within {}s",
                    self.config.timeout_secs
                ))
            })?
            .map_err(|e| LifecycleError::Thumbnail(format!("failed to run ffmpeg: {}", e)))?;

        if !result.status.success() {
            return Err(LifecycleError::Thumbnail(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        if !output.exists() {
            return Err(LifecycleError::Thumbnail("no frame written".to_string()));
        }

        Ok(output)
    }
}
