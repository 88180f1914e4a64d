use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;

use reqwest::Client;
use tempfile::NamedTempFile;
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Minimal config: no credentials, so only the HTTP surface comes up.
fn minimal_config(port: u16) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}
"#,
        port
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Spawn the server with a clean credential environment.
fn server_command() -> tokio::process::Command {
    let mut command = tokio::process::Command::new(env!("CARGO_BIN_EXE_airloop"));
    command
        .env("RUST_LOG", "error") // Quiet logs during tests
        .env_remove("YOUTUBE_CLIENT_ID")
        .env_remove("YOUTUBE_CLIENT_SECRET")
        .env_remove("YOUTUBE_REFRESH_TOKEN")
        .kill_on_drop(true);
    command
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_health_endpoints() {
    let port = get_available_port();
    let config = write_config(&minimal_config(port));

    let mut server = server_command()
        .env("AIRLOOP_CONFIG", config.path())
        .spawn()
        .expect("Failed to spawn server");

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "OK");

    let response = client
        .get(format!("http://127.0.0.1:{}/api/v1/health", port))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");

    // Cleanup
    server.kill().await.ok();
}

#[tokio::test]
async fn test_unconfigured_scheduler_reported() {
    let port = get_available_port();
    let config = write_config(&minimal_config(port));

    let mut server = server_command()
        .env("AIRLOOP_CONFIG", config.path())
        .spawn()
        .expect("Failed to spawn server");

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let json: serde_json::Value = client
        .get(format!("http://127.0.0.1:{}/api/v1/status", port))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(json["scheduler_configured"], false);
    assert_eq!(json["running"], false);

    let json: serde_json::Value = client
        .get(format!("http://127.0.0.1:{}/api/v1/config", port))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(json["server"]["port"], port);
    assert_eq!(json["live_api"]["client_secret_configured"], false);

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_encoder_binary_disables_scheduler() {
    let port = get_available_port();
    let config = write_config(&format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[live_api]
client_id = "client"
client_secret = "secret"
refresh_token = "refresh"

[media]
manifest_url = "http://127.0.0.1:9/manifest.json"

[encoder]
ffmpeg_path = "/nonexistent/ffmpeg"
"#,
        port
    ));

    let mut server = server_command()
        .env("AIRLOOP_CONFIG", config.path())
        .spawn()
        .expect("Failed to spawn server");

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let json: serde_json::Value = Client::new()
        .get(format!("http://127.0.0.1:{}/api/v1/status", port))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(json["scheduler_configured"], false);
    assert_eq!(json["running"], false);

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_uses_environment() {
    let port = get_available_port();

    let mut server = server_command()
        .env("AIRLOOP_CONFIG", "/nonexistent/config.toml")
        .env("AIRLOOP_SERVER__HOST", "127.0.0.1")
        .env("AIRLOOP_SERVER__PORT", port.to_string())
        .spawn()
        .expect("Failed to spawn server");

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start from environment"
    );

    server.kill().await.ok();
}

#[tokio::test]
async fn test_invalid_config_exits_with_error() {
    let config = write_config(
        r#"
[server]
port = 8080

[scheduler]
session_duration_secs = 0
"#,
    );

    let result = timeout(
        Duration::from_secs(5),
        server_command().env("AIRLOOP_CONFIG", config.path()).output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_malformed_config_exits_with_error() {
    let config = write_config("[server\nport = ");

    let result = timeout(
        Duration::from_secs(5),
        server_command().env("AIRLOOP_CONFIG", config.path()).output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}
