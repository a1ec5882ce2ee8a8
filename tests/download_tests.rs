//! Download and inspection route tests.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{slash_prone_chain_records, TestServer};
use shroud_server::inspect::InspectResponse;
use shroud_server::transform::{TransformChain, TransformConfig};

fn sample_content() -> Vec<u8> {
    (0..=255u8).cycle().take(4096).collect()
}

async fn download(server: &TestServer, path: &str, range: Option<(&str, &str)>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let mut builder = Request::get(format!("/files/{}", server.opaque(path)));
    if let Some((name, value)) = range {
        builder = builder.header(name, value);
    }
    let (status, headers, body) = server.send(builder.body(Body::empty()).unwrap()).await;
    (status, headers, body.to_vec())
}

#[tokio::test]
async fn test_whole_file_download() {
    let server = TestServer::new().await;
    let content = sample_content();
    server.write_file("/data.bin", &content);

    let (status, headers, body) = download(&server, "/data.bin", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
    assert_eq!(headers[header::CONTENT_LENGTH], body.len().to_string().as_str());
    assert!(headers.get(header::CONTENT_RANGE).is_none());
    assert_eq!(server.reveal(&body), content);
}

#[tokio::test]
async fn test_range_window_is_independently_obfuscated() {
    let server = TestServer::new().await;
    let content = sample_content();
    server.write_file("/data.bin", &content);

    for (range, start, end) in [("bytes=100-199", 100, 200), ("bytes=4000-", 4000, 4096), ("bytes=-96", 4000, 4096)] {
        let (status, headers, body) = download(&server, "/data.bin", Some(("Range", range))).await;

        assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            headers[header::CONTENT_RANGE],
            format!("bytes {}-{}/4096", start, end - 1).as_str()
        );
        assert_eq!(headers[header::CONTENT_LENGTH], body.len().to_string().as_str());
        assert_eq!(server.reveal(&body), &content[start..end]);
    }
}

#[tokio::test]
async fn test_unsatisfiable_range() {
    let server = TestServer::new().await;
    server.write_file("/data.bin", &sample_content());

    let (status, headers, body) = download(&server, "/data.bin", Some(("Range", "bytes=5000-"))).await;

    assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(headers[header::CONTENT_RANGE], "bytes */4096");
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_custom_range_header_is_remapped() {
    let server = TestServer::with_config(|config| {
        config.range.header = "X-Window".to_string();
        config.range.prefix = "win".to_string();
    })
    .await;
    let content = sample_content();
    server.write_file("/data.bin", &content);

    let (status, headers, body) = download(&server, "/data.bin", Some(("X-Window", "win=0-9"))).await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 0-9/4096");
    assert_eq!(server.reveal(&body), &content[..10]);
}

#[tokio::test]
async fn test_missing_files_and_directories_look_the_same() {
    let server = TestServer::new().await;
    std::fs::create_dir_all(server.absolute("/docs")).unwrap();

    for uri in [
        format!("/files/{}", server.opaque("/missing.bin")),
        format!("/files/{}", server.opaque("/docs")),
        "/files/%21%21%21".to_string(),
    ] {
        let (status, _, body) = server.call("GET", &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());
    }
}

#[tokio::test]
async fn test_traversal_stays_under_root() {
    let server = TestServer::new().await;
    server.write_file("/inside.txt", b"inside");

    let (status, _, body) = download(&server, "/../../inside.txt", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.reveal(&body), b"inside");
}

#[tokio::test]
async fn test_inspect_directory() {
    let server = TestServer::new().await;
    server.write_file("/docs/b.txt", b"bb");
    server.write_file("/docs/a.txt", b"a");
    std::fs::create_dir_all(server.absolute("/docs/sub")).unwrap();

    let uri = format!("/files/{}", server.opaque("/docs"));
    let (status, headers, body) = server.call("PATCH", &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");

    let listing: InspectResponse = serde_json::from_slice(&server.reveal(&body)).unwrap();
    assert_eq!(listing.target, "/docs");
    let names: Vec<&str> = listing.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
    assert_eq!(listing.entries[1].size, 2);
    assert!(listing.entries[2].is_dir);
}

#[tokio::test]
async fn test_inspect_file_and_missing() {
    let server = TestServer::new().await;
    server.write_file("/one.txt", b"12345");

    let uri = format!("/files/{}", server.opaque("/one.txt"));
    let (status, _, body) = server.call("PATCH", &uri).await;
    assert_eq!(status, StatusCode::OK);

    let listing: InspectResponse = serde_json::from_slice(&server.reveal(&body)).unwrap();
    assert_eq!(listing.entries.len(), 1);
    assert_eq!(listing.entries[0].name, "one.txt");
    assert_eq!(listing.entries[0].size, 5);
    assert!(!listing.entries[0].is_dir);

    let uri = format!("/files/{}", server.opaque("/two.txt"));
    let (status, _, body) = server.call("PATCH", &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_chain_swap_applies_to_new_requests() {
    let server = TestServer::new().await;
    server.write_file("/data.bin", b"payload");
    let old_uri = format!("/files/{}", server.opaque("/data.bin"));

    let (next, failures) = TransformChain::from_configs(&[
        TransformConfig::new("reverse"),
        TransformConfig::new("base64").with_option("alphabet", "url"),
    ]);
    assert!(failures.is_empty());
    server.state.chain().replace(next);

    let (status, _, _) = server.call("GET", &old_uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, body) = download(&server, "/data.bin", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.reveal(&body), b"payload");
}

#[tokio::test]
async fn test_opaque_path_starting_with_slash() {
    let server = TestServer::with_chain(&slash_prone_chain_records()).await;
    let path = server.slash_leading_path(".bin");
    server.write_file(&path, b"leading slash");
    server.write_file("/ctrl.bin", b"control");

    let (status, _, body) = download(&server, "/ctrl.bin", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.reveal(&body), b"control");

    let (status, _, body) = download(&server, &path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.reveal(&body), b"leading slash");

    let uri = format!("/files/{}", server.opaque(&path));
    let (status, _, body) = server.call("PATCH", &uri).await;
    assert_eq!(status, StatusCode::OK);
    let listing: InspectResponse = serde_json::from_slice(&server.reveal(&body)).unwrap();
    assert_eq!(listing.target, path);
    assert_eq!(listing.entries[0].size, 13);
}
