use super::*;
use crate::Config;
use crate::downloader::test_helpers::{StubFetcher, fast_settings};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;


/// Downloader wired to `fetcher`, storing catalog items under a fresh temp dir
fn create_test_downloader(fetcher: Arc<StubFetcher>) -> (Arc<BatchDownloader>, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let settings = fast_settings(4);

    let mut config = Config::default();
    config.download.download_root = temp_dir.path().join("downloads");
    config.download.concurrency = settings.concurrency;
    config.download.per_attempt_timeout = settings.per_attempt_timeout;
    config.retry = settings.retry;
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();

    let downloader = BatchDownloader::new(config).unwrap().with_fetcher(fetcher);
    (Arc::new(downloader), temp_dir)
}

/// Router over a downloader whose fetches always succeed
fn test_app() -> (Router, Arc<BatchDownloader>, TempDir) {
    let (downloader, temp_dir) = create_test_downloader(Arc::new(StubFetcher::new()));
    let app = create_router(downloader.clone(), downloader.get_config());
    (app, downloader, temp_dir)
}

async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read_json(response).await
}

async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    read_json(response).await
}

async fn read_json(response: axum::response::Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Catalog item JSON for the supported source and category
fn item(name: &str, url: &str) -> serde_json::Value {
    serde_json::json!({
        "image_url": url,
        "name": name,
        "source": "wikipedia",
        "category": "animals",
    })
}

#[tokio::test]
async fn test_cors_enabled() {
    let (downloader, _temp_dir) = create_test_downloader(Arc::new(StubFetcher::new()));

    let mut config = (*downloader.get_config()).clone();
    config.api.cors_enabled = true;
    config.api.cors_origins = vec!["*".to_string()];
    let app = create_router(downloader, Arc::new(config));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers().contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (downloader, _temp_dir) = create_test_downloader(Arc::new(StubFetcher::new()));

    let mut config = (*downloader.get_config()).clone();
    config.api.cors_enabled = false;
    let app = create_router(downloader, Arc::new(config));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_swagger_ui_toggle() {
    let (downloader, _temp_dir) = create_test_downloader(Arc::new(StubFetcher::new()));

    let enabled = create_router(downloader.clone(), downloader.get_config());
    let response = enabled
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut config = (*downloader.get_config()).clone();
    config.api.swagger_ui = false;
    let disabled = create_router(downloader, Arc::new(config));
    let response = disabled
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_serve_answers_and_shuts_down() {
    let (downloader, _temp_dir) = create_test_downloader(Arc::new(StubFetcher::new()));
    let config = downloader.get_config();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(serve(listener, downloader, config, async move {
        stop_rx.await.ok();
    }));

    // A raw HTTP/1.1 request is enough to prove the listener is serving
    let mut stream = tokio::net::TcpStream::connect(address).await.unwrap();
    tokio::io::AsyncWriteExt::write_all(
        &mut stream,
        b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await
    .unwrap();
    let mut response = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut stream, &mut response)
        .await
        .unwrap();
    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 200"), "got: {response}");
    assert!(response.contains("\"healthy\""));

    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop after the shutdown signal")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_spawn_api_server_method() {
    let (downloader, _temp_dir) = create_test_downloader(Arc::new(StubFetcher::new()));

    let api_handle = downloader.spawn_api_server();

    // Give it a moment to bind
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished(), "server should still be running");

    api_handle.abort();
}

#[tokio::test]
async fn test_start_api_server_reports_bind_failure() {
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (downloader, _temp_dir) = create_test_downloader(Arc::new(StubFetcher::new()));

    let mut config = (*downloader.get_config()).clone();
    config.api.bind_address = occupied.local_addr().unwrap();

    let result = start_api_server(downloader, Arc::new(config)).await;
    assert!(matches!(result, Err(crate::Error::Io(_))));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _downloader, _temp_dir) = test_app();
    let (status, _) = get(app, "/downloads").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
