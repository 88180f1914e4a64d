//! Configuration for the encoder supervisor.
//!
//! The argument template is static: every value here is fixed for the
//! lifetime of the process and nothing is computed at runtime.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How audio reaches the encoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFeed {
    /// A concat playlist file listing the whole queue.
    #[default]
    Playlist,
    /// A named pipe fed track by track by a companion task.
    Pipe,
}

/// Configuration for the ffmpeg-based encoder supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Directory for per-session files (playlist, FIFO).
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Audio feed mode.
    #[serde(default)]
    pub audio_feed: AudioFeed,

    /// Demuxer used to read the pipe in `pipe` mode.
    #[serde(default = "default_pipe_format")]
    pub pipe_input_format: String,

    /// Output width; the visual is scaled when both width and height are set.
    #[serde(default = "default_width")]
    pub width: Option<u32>,

    /// Output height.
    #[serde(default = "default_height")]
    pub height: Option<u32>,

    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Keyframe interval in frames.
    #[serde(default = "default_gop")]
    pub gop: u32,

    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    #[serde(default = "default_video_bitrate")]
    pub video_bitrate_kbps: u32,

    #[serde(default = "default_buffer_size")]
    pub buffer_size_kbps: u32,

    #[serde(default = "default_preset")]
    pub preset: String,

    #[serde(default = "default_tune")]
    pub tune: String,

    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate_kbps: u32,

    #[serde(default = "default_sample_rate")]
    pub audio_sample_rate: u32,

    #[serde(default = "default_channels")]
    pub audio_channels: u8,

    /// Container written to the ingest URL.
    #[serde(default = "default_output_format")]
    pub output_format: String,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Seconds to wait after SIGTERM before force-killing.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,

    /// Seconds between liveness probes.
    #[serde(default = "default_liveness_interval")]
    pub liveness_interval_secs: u64,

    /// Restart cap per session. Unbounded when unset.
    #[serde(default)]
    pub max_restarts: Option<u32>,

    /// Additional arguments inserted before the output.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("airloop")
}

fn default_pipe_format() -> String {
    "mp3".to_string()
}

fn default_width() -> Option<u32> {
    Some(1920)
}

fn default_height() -> Option<u32> {
    Some(1080)
}

fn default_frame_rate() -> u32 {
    30
}

fn default_gop() -> u32 {
    60
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_video_bitrate() -> u32 {
    4000
}

fn default_buffer_size() -> u32 {
    8000
}

fn default_preset() -> String {
    "ultrafast".to_string()
}

fn default_tune() -> String {
    "zerolatency".to_string()
}

fn default_pixel_format() -> String {
    "yuv420p".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_audio_bitrate() -> u32 {
    128
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_channels() -> u8 {
    2
}

fn default_output_format() -> String {
    "flv".to_string()
}

fn default_log_level() -> String {
    "warning".to_string()
}

fn default_stop_timeout() -> u64 {
    10
}

fn default_liveness_interval() -> u64 {
    15
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            work_dir: default_work_dir(),
            audio_feed: AudioFeed::default(),
            pipe_input_format: default_pipe_format(),
            width: default_width(),
            height: default_height(),
            frame_rate: default_frame_rate(),
            gop: default_gop(),
            video_codec: default_video_codec(),
            video_bitrate_kbps: default_video_bitrate(),
            buffer_size_kbps: default_buffer_size(),
            preset: default_preset(),
            tune: default_tune(),
            pixel_format: default_pixel_format(),
            audio_codec: default_audio_codec(),
            audio_bitrate_kbps: default_audio_bitrate(),
            audio_sample_rate: default_sample_rate(),
            audio_channels: default_channels(),
            output_format: default_output_format(),
            ffmpeg_log_level: default_log_level(),
            stop_timeout_secs: default_stop_timeout(),
            liveness_interval_secs: default_liveness_interval(),
            max_restarts: None,
            extra_ffmpeg_args: Vec::new(),
        }
    }
}

impl EncoderConfig {
    /// Creates a config pointing at a custom ffmpeg binary.
    pub fn with_ffmpeg_path(ffmpeg_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ..Default::default()
        }
    }

    /// Sets the per-session work directory.
    pub fn with_work_dir(mut self, work_dir: PathBuf) -> Self {
        self.work_dir = work_dir;
        self
    }

    /// Sets the audio feed mode.
    pub fn with_audio_feed(mut self, audio_feed: AudioFeed) -> Self {
        self.audio_feed = audio_feed;
        self
    }

    /// Sets the graceful stop timeout.
    pub fn with_stop_timeout(mut self, timeout_secs: u64) -> Self {
        self.stop_timeout_secs = timeout_secs;
        self
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_secs(self.liveness_interval_secs.max(1))
    }
}
