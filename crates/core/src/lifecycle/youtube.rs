//! YouTube Live client over the Data API v3.
//!
//! Every request carries a bearer token obtained by exchanging the configured
//! refresh token at the OAuth endpoint. The token is cached until shortly
//! before it expires.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::api::LiveApi;
use super::config::LiveApiConfig;
use super::error::LiveApiError;
use super::types::{BroadcastRequest, BroadcastState, IngestEndpoint, IngestStatus, StreamRequest};
use crate::metrics;

/// Tokens this close to expiry are refreshed before use.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct IdResource {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StreamResource {
    id: String,
    cdn: Cdn,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Cdn {
    ingestion_info: IngestionInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestionInfo {
    ingestion_address: String,
    stream_name: String,
}

#[derive(Debug, Deserialize)]
struct StreamList {
    #[serde(default)]
    items: Vec<StreamStatusItem>,
}

#[derive(Debug, Deserialize)]
struct StreamStatusItem {
    status: StreamStatusBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamStatusBody {
    stream_status: String,
}

/// YouTube Live API client.
pub struct YouTubeLiveApi {
    client: Client,
    config: LiveApiConfig,
    token: RwLock<Option<CachedToken>>,
}

impl YouTubeLiveApi {
    /// Create a new client. Fails when credentials are missing.
    pub fn new(config: LiveApiConfig) -> Result<Self, LiveApiError> {
        if !config.is_configured() {
            return Err(LiveApiError::NotConfigured(
                "client_id, client_secret and refresh_token are required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            token: RwLock::new(None),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    /// Returns a valid access token, refreshing it when needed.
    async fn access_token(&self) -> Result<String, LiveApiError> {
        if let Some(token) = self.token.read().await.as_ref() {
            if token.is_fresh() {
                return Ok(token.access_token.clone());
            }
        }

        let mut guard = self.token.write().await;
        // Another caller may have refreshed while we waited.
        if let Some(token) = guard.as_ref() {
            if token.is_fresh() {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Refreshing live API access token");
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", self.config.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            record("token", false);
            let body = response.text().await.unwrap_or_default();
            return Err(LiveApiError::Auth(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }
        record("token", true);

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| LiveApiError::Parse(format!("token response: {}", e)))?;

        let expires_in = Duration::from_secs(token.expires_in.unwrap_or(3600));
        *guard = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Instant::now() + expires_in,
        });

        Ok(token.access_token)
    }

    /// Sends an authenticated request and maps non-success statuses.
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, LiveApiError> {
        let token = self.access_token().await?;

        let response = match request.bearer_auth(token).send().await {
            Ok(response) => response,
            Err(e) => {
                record(operation, false);
                return Err(e.into());
            }
        };

        let status = response.status();
        if status.is_success() {
            record(operation, true);
            return Ok(response);
        }
        record(operation, false);

        if status == 401 {
            // Force a fresh token on the next call.
            *self.token.write().await = None;
        }

        let body = response.text().await.unwrap_or_default();
        if status == 404 {
            return Err(LiveApiError::NotFound(body));
        }
        Err(LiveApiError::Api {
            status: status.as_u16(),
            message: body,
        })
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: Response,
        what: &str,
    ) -> Result<T, LiveApiError> {
        response
            .json()
            .await
            .map_err(|e| LiveApiError::Parse(format!("{}: {}", what, e)))
    }
}

#[async_trait]
impl LiveApi for YouTubeLiveApi {
    fn name(&self) -> &str {
        "youtube"
    }

    async fn create_broadcast(&self, request: &BroadcastRequest) -> Result<String, LiveApiError> {
        let body = json!({
            "snippet": {
                "title": request.title,
                "description": request.description,
                "scheduledStartTime": request.scheduled_start.to_rfc3339(),
            },
            "status": {
                "privacyStatus": request.privacy_status,
                "selfDeclaredMadeForKids": false,
            },
            "contentDetails": {
                "enableAutoStart": false,
                "enableAutoStop": false,
                "latencyPreference": "normal",
            },
        });

        let response = self
            .send(
                "create_broadcast",
                self.client
                    .post(self.api_url("liveBroadcasts"))
                    .query(&[("part", "snippet,status,contentDetails")])
                    .json(&body),
            )
            .await?;

        let created: IdResource = Self::parse(response, "broadcast").await?;
        info!("Created broadcast {} ('{}')", created.id, request.title);
        Ok(created.id)
    }

    async fn create_stream(&self, request: &StreamRequest) -> Result<IngestEndpoint, LiveApiError> {
        let body = json!({
            "snippet": { "title": request.title },
            "cdn": {
                "frameRate": request.frame_rate,
                "ingestionType": "rtmp",
                "resolution": request.resolution,
            },
        });

        let response = self
            .send(
                "create_stream",
                self.client
                    .post(self.api_url("liveStreams"))
                    .query(&[("part", "snippet,cdn")])
                    .json(&body),
            )
            .await?;

        let stream: StreamResource = Self::parse(response, "stream").await?;
        let info = stream.cdn.ingestion_info;
        Ok(IngestEndpoint {
            stream_id: stream.id,
            ingest_url: format!(
                "{}/{}",
                info.ingestion_address.trim_end_matches('/'),
                info.stream_name
            ),
        })
    }

    async fn bind(&self, broadcast_id: &str, stream_id: &str) -> Result<(), LiveApiError> {
        self.send(
            "bind",
            self.client
                .post(self.api_url("liveBroadcasts/bind"))
                .query(&[
                    ("id", broadcast_id),
                    ("part", "id,contentDetails"),
                    ("streamId", stream_id),
                ]),
        )
        .await?;
        debug!("Bound broadcast {} to stream {}", broadcast_id, stream_id);
        Ok(())
    }

    async fn set_thumbnail(&self, broadcast_id: &str, image: &Path) -> Result<(), LiveApiError> {
        let bytes = tokio::fs::read(image).await?;
        let url = format!(
            "{}/thumbnails/set",
            self.config.upload_base_url.trim_end_matches('/')
        );

        self.send(
            "set_thumbnail",
            self.client
                .post(url)
                .query(&[("videoId", broadcast_id)])
                .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
                .body(bytes),
        )
        .await?;
        Ok(())
    }

    async fn stream_status(&self, stream_id: &str) -> Result<IngestStatus, LiveApiError> {
        let response = self
            .send(
                "stream_status",
                self.client
                    .get(self.api_url("liveStreams"))
                    .query(&[("part", "status"), ("id", stream_id)]),
            )
            .await?;

        let list: StreamList = Self::parse(response, "stream list").await?;
        list.items
            .into_iter()
            .next()
            .map(|item| IngestStatus::from_api(&item.status.stream_status))
            .ok_or_else(|| LiveApiError::NotFound(format!("stream {}", stream_id)))
    }

    async fn transition(
        &self,
        broadcast_id: &str,
        target: BroadcastState,
    ) -> Result<(), LiveApiError> {
        let status = match target {
            BroadcastState::Testing | BroadcastState::Live | BroadcastState::Complete => {
                target.as_str()
            }
            other => {
                return Err(LiveApiError::Api {
                    status: 400,
                    message: format!("'{}' is not a remote broadcast status", other),
                })
            }
        };

        let result = self
            .send(
                "transition",
                self.client
                    .post(self.api_url("liveBroadcasts/transition"))
                    .query(&[
                        ("broadcastStatus", status),
                        ("id", broadcast_id),
                        ("part", "status"),
                    ]),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(LiveApiError::Api { message, .. })
                if error_reason(&message).as_deref() == Some("redundantTransition") =>
            {
                debug!("Broadcast {} already {}", broadcast_id, status);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_broadcast(&self, broadcast_id: &str) -> Result<(), LiveApiError> {
        self.send(
            "delete_broadcast",
            self.client
                .delete(self.api_url("liveBroadcasts"))
                .query(&[("id", broadcast_id)]),
        )
        .await?;
        info!("Deleted broadcast {}", broadcast_id);
        Ok(())
    }
}

fn record(operation: &str, success: bool) {
    metrics::LIVE_API_REQUESTS
        .with_label_values(&[operation, if success { "success" } else { "error" }])
        .inc();
}

/// Extracts `error.errors[0].reason` from a Google API error body.
fn error_reason(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("errors")?
        .get(0)?
        .get("reason")?
        .as_str()
        .map(str::to_string)
}
