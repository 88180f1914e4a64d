//! Encoder supervisor: owns the external ffmpeg process for a session.
//!
//! A session gets exactly one supervised unit. The unit spawns ffmpeg with a
//! static argument template, probes it for liveness, restarts it with the
//! same arguments after a crash and tears it (and its companion tasks) down
//! on stop.

mod args;
mod config;
mod error;
mod feeder;
mod ffmpeg;
mod keep_alive;
mod traits;

pub use args::{
    build_args, redact_ingest_url, render_playlist, validate_ingest_url, AudioInput,
    EncoderInputs,
};
pub use config::{AudioFeed, EncoderConfig};
pub use error::EncoderError;
pub use feeder::{create_fifo, feed_fifo, unblock_fifo};
pub use ffmpeg::{FfmpegEncoder, FfmpegSupervisor};
pub use keep_alive::{keep_alive, supervise, KeepAliveOutcome, RestartPolicy};
pub use traits::{EncoderProcess, EncoderSupervisor, SupervisedEncoder};
