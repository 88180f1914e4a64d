use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use airloop_core::{
    config_path, load_config, load_config_from_env, validate_config, AssetSource,
    BroadcastCoordinator, Clock, Config, EncoderSupervisor, FfmpegSupervisor, HttpMediaCache,
    LiveApi, ManifestAssetSource, MediaCache, RestartPolicy, SessionScheduler, SystemClock,
    Thumbnailer, YouTubeLiveApi,
};

use airloop_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration; a missing file means defaults plus environment
    let config_path = config_path();
    let config = if config_path.exists() {
        info!("Loading configuration from {:?}", config_path);
        load_config(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        warn!(
            "Config file {:?} not found, using defaults and environment",
            config_path
        );
        load_config_from_env().context("Failed to load config from environment")?
    };

    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );

    let scheduler = build_scheduler(&config).await?.map(Arc::new);

    match &scheduler {
        Some(scheduler) if config.scheduler.enabled => {
            scheduler.start().await;
            info!("Session scheduler started");
        }
        Some(_) => info!("Session scheduler disabled in config"),
        None => {}
    }

    let state = Arc::new(AppState::new(config.clone(), scheduler.clone()));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Finalizes any in-flight broadcast before the encoder is torn down.
    if let Some(ref scheduler) = scheduler {
        info!("Stopping session scheduler...");
        scheduler.stop().await;
        info!("Session scheduler stopped");
    }

    info!("Server shut down");
    Ok(())
}

/// Wire the scheduler from config.
///
/// Returns `None` when the live API credentials or the media manifest are
/// missing, or the encoder binary does not run; the HTTP surface still comes
/// up so the config can be inspected.
async fn build_scheduler(config: &Config) -> Result<Option<SessionScheduler>> {
    if !config.live_api.is_configured() {
        warn!("Live API credentials not configured, scheduler unavailable");
        return Ok(None);
    }
    if config.media.manifest_url.is_empty() {
        warn!("media.manifest_url not set, scheduler unavailable");
        return Ok(None);
    }

    let cache: Arc<dyn MediaCache> = Arc::new(
        HttpMediaCache::new(&config.media).context("Failed to create media cache")?,
    );
    info!("Media cache at {:?}", config.media.cache_dir);

    let assets: Arc<dyn AssetSource> = Arc::new(
        ManifestAssetSource::new(&config.media, cache)
            .context("Failed to create manifest asset source")?,
    );

    let api: Arc<dyn LiveApi> = Arc::new(
        YouTubeLiveApi::new(config.live_api.clone()).context("Failed to create live API client")?,
    );
    info!("Live API client at {}", config.live_api.api_base_url);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let mut coordinator =
        BroadcastCoordinator::new(api, Arc::clone(&clock), config.lifecycle.clone());
    if config.lifecycle.thumbnail.enabled {
        coordinator = coordinator.with_thumbnailer(Thumbnailer::new(
            config.encoder.ffmpeg_path.clone(),
            config.encoder.work_dir.join("thumbnails"),
            config.lifecycle.thumbnail.clone(),
        ));
    }

    let supervisor: Arc<dyn EncoderSupervisor> =
        Arc::new(FfmpegSupervisor::new(config.encoder.clone()));
    if let Err(e) = supervisor.validate().await {
        warn!("{}, scheduler unavailable", e);
        return Ok(None);
    }
    info!("Encoder binary: {:?}", config.encoder.ffmpeg_path);

    Ok(Some(SessionScheduler::new(
        config.scheduler.clone(),
        RestartPolicy::from_config(&config.encoder),
        assets,
        Arc::new(coordinator),
        supervisor,
        clock,
    )))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
