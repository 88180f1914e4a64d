//! Argument template for the encoder process.

use std::path::{Path, PathBuf};

use super::config::EncoderConfig;
use super::error::EncoderError;
use crate::media::MediaKind;

/// Where the encoder reads audio from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioInput {
    /// Concat playlist file.
    Playlist(PathBuf),
    /// Named pipe fed by the companion feeder task.
    Pipe(PathBuf),
}

/// Resolved inputs for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderInputs {
    pub visual: PathBuf,
    pub visual_kind: MediaKind,
    pub audio: AudioInput,
}

/// Reject ingest targets ffmpeg cannot publish to.
pub fn validate_ingest_url(url: &str) -> Result<(), EncoderError> {
    let scheme = url.split("://").next().unwrap_or_default();
    if url.len() <= scheme.len() + 3 {
        return Err(EncoderError::IngestRejected {
            reason: format!("not a URL: {}", redact_ingest_url(url)),
        });
    }
    match scheme {
        "rtmp" | "rtmps" | "srt" | "file" => Ok(()),
        other => Err(EncoderError::IngestRejected {
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

/// Hide the stream key (last path segment) of an ingest URL.
pub fn redact_ingest_url(url: &str) -> String {
    match url.rfind('/') {
        Some(idx) if idx + 1 < url.len() && url[..idx].contains("://") => {
            format!("{}/****", &url[..idx])
        }
        _ => url.to_string(),
    }
}

/// Builds the full ffmpeg argument list (without the program name).
///
/// Input 0 is the visual, input 1 the audio. The visual is looped forever and
/// the playlist is looped too, so content exhaustion never ends the stream.
pub fn build_args(config: &EncoderConfig, inputs: &EncoderInputs, ingest_url: &str) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-loglevel".to_string(),
        config.ffmpeg_log_level.clone(),
    ];

    // Visual input
    match inputs.visual_kind {
        MediaKind::Image => args.extend([
            "-loop".to_string(),
            "1".to_string(),
            "-framerate".to_string(),
            config.frame_rate.to_string(),
        ]),
        _ => args.extend(["-stream_loop".to_string(), "-1".to_string()]),
    }
    args.extend([
        "-re".to_string(),
        "-i".to_string(),
        path_arg(&inputs.visual),
    ]);

    // Audio input
    match &inputs.audio {
        AudioInput::Playlist(list) => args.extend([
            "-stream_loop".to_string(),
            "-1".to_string(),
            "-re".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            path_arg(list),
        ]),
        AudioInput::Pipe(fifo) => args.extend([
            "-re".to_string(),
            "-f".to_string(),
            config.pipe_input_format.clone(),
            "-i".to_string(),
            path_arg(fifo),
        ]),
    }

    args.extend([
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
    ]);

    // Video encoding
    args.extend([
        "-c:v".to_string(),
        config.video_codec.clone(),
        "-preset".to_string(),
        config.preset.clone(),
        "-tune".to_string(),
        config.tune.clone(),
        "-b:v".to_string(),
        format!("{}k", config.video_bitrate_kbps),
        "-maxrate".to_string(),
        format!("{}k", config.video_bitrate_kbps),
        "-bufsize".to_string(),
        format!("{}k", config.buffer_size_kbps),
        "-r".to_string(),
        config.frame_rate.to_string(),
        "-g".to_string(),
        config.gop.to_string(),
        "-keyint_min".to_string(),
        config.gop.to_string(),
        "-pix_fmt".to_string(),
        config.pixel_format.clone(),
    ]);

    if let (Some(width), Some(height)) = (config.width, config.height) {
        if width > 0 && height > 0 {
            args.extend([
                "-vf".to_string(),
                format!(
                    "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
                    w = width,
                    h = height
                ),
            ]);
        }
    }

    // Audio encoding
    args.extend([
        "-c:a".to_string(),
        config.audio_codec.clone(),
        "-b:a".to_string(),
        format!("{}k", config.audio_bitrate_kbps),
        "-ar".to_string(),
        config.audio_sample_rate.to_string(),
        "-ac".to_string(),
        config.audio_channels.to_string(),
    ]);

    // Extra args
    args.extend(config.extra_ffmpeg_args.iter().cloned());

    // Output
    args.extend([
        "-f".to_string(),
        config.output_format.clone(),
        ingest_url.to_string(),
    ]);

    args
}

/// Renders a concat-demuxer playlist for the given tracks.
pub fn render_playlist(tracks: &[PathBuf]) -> String {
    let mut out = String::from("ffconcat version 1.0\n");
    for track in tracks {
        // Single quotes are closed, escaped and reopened.
        let escaped = path_arg(track).replace('\'', r"'\''");
        out.push_str(&format!("file '{}'\n", escaped));
    }
    out
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
