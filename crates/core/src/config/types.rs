use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::encoder::EncoderConfig;
use crate::lifecycle::{LifecycleConfig, LiveApiConfig};
use crate::media::MediaConfig;
use crate::scheduler::SchedulerConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub live_api: LiveApiConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    10000
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub live_api: SanitizedLiveApiConfig,
    pub media: MediaConfig,
    pub encoder: EncoderConfig,
    pub lifecycle: LifecycleConfig,
    pub scheduler: SchedulerConfig,
}

/// Sanitized live API config (credentials hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedLiveApiConfig {
    pub client_id_configured: bool,
    pub client_secret_configured: bool,
    pub refresh_token_configured: bool,
    pub api_base_url: String,
    pub token_url: String,
    pub request_timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            live_api: SanitizedLiveApiConfig {
                client_id_configured: !config.live_api.client_id.is_empty(),
                client_secret_configured: !config.live_api.client_secret.is_empty(),
                refresh_token_configured: !config.live_api.refresh_token.is_empty(),
                api_base_url: config.live_api.api_base_url.clone(),
                token_url: config.live_api.token_url.clone(),
                request_timeout_secs: config.live_api.request_timeout_secs,
            },
            media: config.media.clone(),
            encoder: config.encoder.clone(),
            lifecycle: config.lifecycle.clone(),
            scheduler: config.scheduler.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_hides_credentials() {
        let mut config = Config::default();
        config.live_api.client_id = "client".to_string();
        config.live_api.client_secret = "very-secret".to_string();
        config.live_api.refresh_token = "1//refresh".to_string();

        let sanitized = SanitizedConfig::from(&config);
        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("very-secret"));
        assert!(!json.contains("1//refresh"));
        assert!(sanitized.live_api.client_secret_configured);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 10000);
        assert!(config.scheduler.enabled);
        assert!(!config.live_api.is_configured());
    }
}
