//! Loader, landing and health route tests.

mod common;

use axum::http::{header, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine};
use common::{TestServer, LOADER_KEY};
use shroud_server::transform::Xor;

#[tokio::test]
async fn test_loader_script_is_fresh_per_request() {
    let server = TestServer::new().await;

    let (status, headers, first) = server.call("GET", "/loader.js").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/javascript");
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");

    let (_, _, second) = server.call("GET", "/loader.js").await;
    assert!(!first.is_empty());
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_loader_pages() {
    let server = TestServer::new().await;

    let (status, headers, body) = server.call("GET", "/loader.html").await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
    let page = String::from_utf8(body.to_vec()).unwrap();
    assert!(page.contains("<textarea readonly>"));

    let (status, _, body) = server.call("GET", "/auto.html").await;
    assert_eq!(status, StatusCode::OK);
    let page = String::from_utf8(body.to_vec()).unwrap();
    assert!(page.contains("<script>"));
}

#[tokio::test]
async fn test_loader_routes_are_configurable() {
    let server = TestServer::with_config(|config| {
        config.loader.js_route = "/static/app.js".to_string();
    })
    .await;

    let (status, _, _) = server.call("GET", "/static/app.js").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = server.call("GET", "/loader.js").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_landing_asset_plain_and_encrypted() {
    let server = TestServer::new().await;

    let (status, headers, body) = server.call("GET", "/k9f2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/css");
    assert_eq!(&body[..], b"body{margin:0}");

    let (status, headers, body) = server.call("GET", "/x7q1?crypt=a8Fz2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");

    let decoded = STANDARD.decode(&body).unwrap();
    let plain = Xor::new(LOADER_KEY).unwrap().xor(&decoded);
    assert_eq!(plain, b"render(\"root\");");
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let server = TestServer::new().await;

    let (status, _, body) = server.call("GET", "/nothing-here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_health_is_not_obfuscated() {
    let server = TestServer::new().await;

    let (status, _, body) = server.call("GET", "/health").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}
