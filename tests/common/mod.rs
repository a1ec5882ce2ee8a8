//! Common test utilities.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use shroud_server::codec::encode_path;
use shroud_server::config::Config;
use shroud_server::landing::{LandingRoute, LandingStore};
use shroud_server::routes;
use shroud_server::state::AppState;
use shroud_server::transform::{ChainHandle, TransformChain, TransformConfig};
use shroud_server::upload::UploadManager;
use tempfile::TempDir;
use tower::ServiceExt;

#[allow(dead_code)]
pub const LOADER_KEY: &str = "integration-loader-key";

/// Transform records every test server starts with
#[allow(dead_code)]
pub fn test_chain_records() -> Vec<TransformConfig> {
    vec![
        TransformConfig::new("xor").with_option("key", "integration-key"),
        TransformConfig::new("base64").with_option("alphabet", "url"),
    ]
}

/// Records whose standard base64 output can begin with `/`
#[allow(dead_code)]
pub fn slash_prone_chain_records() -> Vec<TransformConfig> {
    vec![
        TransformConfig::new("aes").with_option("key", "integration-key"),
        TransformConfig::new("base64").with_option("alphabet", "standard"),
    ]
}

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub root: PathBuf,
    pub registrants_file: PathBuf,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with a temporary root directory.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut Config),
    {
        Self::build(&test_chain_records(), modifier).await
    }

    /// Create a test server that starts with a different chain.
    pub async fn with_chain(records: &[TransformConfig]) -> Self {
        Self::build(records, |_| {}).await
    }

    async fn build<F>(records: &[TransformConfig], modifier: F) -> Self
    where
        F: FnOnce(&mut Config),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let root = temp_dir.path().join("root");
        std::fs::create_dir_all(&root).expect("Failed to create root directory");
        let registrants_file = temp_dir.path().join("registrants.json");

        let mut config = Config::default();
        config.files.root_dir = root.clone();
        config.uploads.registrants_file = registrants_file.clone();
        config.loader.key = LOADER_KEY.to_string();
        modifier(&mut config);

        let chain = ChainHandle::new(TransformChain::from_configs_logged(records));

        let uploads = UploadManager::load(
            config.uploads.registrants_file.clone(),
            chrono::Duration::hours(config.uploads.max_upload_hours),
        )
        .await
        .expect("Failed to create upload manager");

        let landing = LandingStore::from_contents(
            vec![
                (LandingRoute::new("main.css", "/k9f2"), b"body{margin:0}".to_vec()),
                (LandingRoute::new("main.js", "/x7q1"), b"render(\"root\");".to_vec()),
            ],
            &config.loader.key,
        )
        .expect("Failed to build landing store");

        let state = AppState::new(config, chain, uploads, landing).expect("Failed to create state");
        let router = routes::router(state.clone());

        Self {
            router,
            state,
            root,
            registrants_file,
            _temp_dir: temp_dir,
        }
    }

    /// Snapshot of the active chain
    pub fn chain(&self) -> Arc<TransformChain> {
        self.state.chain().current()
    }

    /// Opaque form of a real relative path
    pub fn opaque(&self, path: &str) -> String {
        encode_path(&self.chain(), path).expect("Failed to encode path")
    }

    /// First `/f{i}{suffix}` path whose opaque form begins with `/`
    pub fn slash_leading_path(&self, suffix: &str) -> String {
        (0..10_000)
            .map(|i| format!("/f{}{}", i, suffix))
            .find(|path| self.opaque(path).starts_with('/'))
            .expect("No path encodes with a leading '/'")
    }

    pub fn obfuscate(&self, data: &[u8]) -> Vec<u8> {
        self.chain().apply(data).expect("Failed to obfuscate")
    }

    pub fn reveal(&self, data: &[u8]) -> Vec<u8> {
        self.chain().invert(data).expect("Failed to deobfuscate")
    }

    /// Deobfuscate a JSON response body
    pub fn reveal_json(&self, data: &[u8]) -> serde_json::Value {
        serde_json::from_slice(&self.reveal(data)).expect("Response is not JSON")
    }

    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative.trim_start_matches('/'))
    }

    pub fn write_file(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.absolute(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Send a request and collect the response
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body)
    }

    /// Send a request with an empty body
    pub async fn call(&self, method: &str, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }
}

