//! Core library for airloop, an unattended 24/7 live broadcasting
//! orchestrator.
//!
//! A session turns a cached visual and an audio queue into a supervised
//! encoder process publishing to a remote ingest endpoint, while the remote
//! broadcast is driven through `Created → Testing → Live → Complete`. The
//! scheduler runs sessions back-to-back forever.

pub mod clock;
pub mod config;
pub mod encoder;
pub mod lifecycle;
pub mod media;
pub mod metrics;
pub mod plan;
pub mod retry;
pub mod scheduler;
pub mod testing;

pub use clock::{Clock, SystemClock};
pub use config::{
    config_path, load_config, load_config_from_env, load_config_from_str, validate_config,
    Config, ConfigError, SanitizedConfig, ServerConfig,
};
pub use encoder::{
    EncoderConfig, EncoderError, EncoderProcess, EncoderSupervisor, FfmpegSupervisor,
    RestartPolicy, SupervisedEncoder,
};
pub use lifecycle::{
    BroadcastCoordinator, BroadcastHandle, BroadcastState, LifecycleConfig, LifecycleError,
    LiveApi, LiveApiConfig, LiveApiError, Thumbnailer, YouTubeLiveApi,
};
pub use media::{
    AssetSource, FetchError, HttpMediaCache, ManifestAssetSource, MediaAsset, MediaCache,
    MediaConfig, MediaKind, MediaPool,
};
pub use plan::SessionPlan;
pub use retry::RetryPolicy;
pub use scheduler::{
    CycleState, SchedulerConfig, SchedulerStatus, SessionError, SessionOutcome, SessionReport,
    SessionScheduler,
};
