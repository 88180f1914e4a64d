use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, middleware::metrics_middleware};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::get_status))
        .route("/config", get(handlers::get_config));

    Router::new()
        .route("/health", get(handlers::liveness))
        .route("/metrics", get(handlers::metrics))
        .nest("/api/v1", api_routes)
        .route_layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use airloop_core::Config;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(Arc::new(AppState::new(Config::default(), None)))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_plain_liveness() {
        let (status, body) = get(app(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
    }

    #[tokio::test]
    async fn test_status_without_scheduler() {
        let (status, body) = get(app(), "/api/v1/status").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["scheduler_configured"], false);
        assert_eq!(json["running"], false);
        assert_eq!(json["cycles"], 0);
    }

    #[tokio::test]
    async fn test_config_redacts_credentials() {
        let mut config = Config::default();
        config.live_api.client_secret = "super-secret".to_string();
        let app = create_router(Arc::new(AppState::new(config, None)));

        let (status, body) = get(app, "/api/v1/config").await;
        assert_eq!(status, StatusCode::OK);

        let text = String::from_utf8(body).unwrap();
        assert!(!text.contains("super-secret"));
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["live_api"]["client_secret_configured"], true);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (status, _) = get(app(), "/api/v1/unknown").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
