use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Durations the scheduler and encoder divide or loop by are positive
/// - Retry policies make at least one attempt
/// - Output size is given as both width and height, or neither
/// - The manifest URL, when set, is http(s)
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    // Scheduler validation
    if config.scheduler.session_duration_secs == 0 {
        return Err(invalid("scheduler.session_duration_secs must be positive"));
    }
    if config.scheduler.estimated_track_secs == 0 {
        return Err(invalid("scheduler.estimated_track_secs must be positive"));
    }

    // Encoder validation
    let encoder = &config.encoder;
    if encoder.liveness_interval_secs == 0 {
        return Err(invalid("encoder.liveness_interval_secs must be positive"));
    }
    if encoder.frame_rate == 0 {
        return Err(invalid("encoder.frame_rate must be positive"));
    }
    if encoder.width.is_some() != encoder.height.is_some() {
        return Err(invalid(
            "encoder.width and encoder.height must be set together",
        ));
    }

    // Lifecycle validation
    if config.lifecycle.ingest_poll.max_attempts == 0 {
        return Err(invalid("lifecycle.ingest_poll.max_attempts must be positive"));
    }
    if config.lifecycle.api_retry.max_attempts == 0 {
        return Err(invalid("lifecycle.api_retry.max_attempts must be positive"));
    }

    // Media validation
    let manifest_url = &config.media.manifest_url;
    if !manifest_url.is_empty()
        && !(manifest_url.starts_with("http://") || manifest_url.starts_with("https://"))
    {
        return Err(invalid("media.manifest_url must be an http(s) URL"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
