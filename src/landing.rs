//! Landing asset store
//!
//! Front-end assets are served under configured fake paths. A request
//! carrying the crypt query parameter receives the asset XOR-encrypted with
//! the loader key and base64 encoded, which is what the stage 1 loader
//! expects; otherwise the asset is served as-is with its own content type.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::body::Bytes;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::loader::{LinkAsset, LoaderAssets};
use crate::transform::{TransformError, Xor};

/// Content type of encrypted landing assets
pub const ENCRYPTED_CONTENT_TYPE: &str = "text/plain";

/// Landing store error types
#[derive(Debug, thiserror::Error)]
pub enum LandingError {
    #[error("Failed to read landing file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Landing path must start with '/': {0}")]
    InvalidPath(String),

    #[error("Landing path configured twice: {0}")]
    DuplicatePath(String),

    #[error("Invalid loader key: {0}")]
    Key(#[from] TransformError),
}

/// Maps a file in the landing directory to the path it is served under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandingRoute {
    /// File name relative to the landing directory
    pub file: String,
    /// Fake request path, e.g. `/a8f3.js`
    pub path: String,
}

impl LandingRoute {
    pub fn new(file: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            path: path.into(),
        }
    }
}

/// One landing asset in both forms
#[derive(Debug, Clone)]
pub struct LandingFile {
    pub name: String,
    pub path: String,
    pub mime: String,
    plain: Bytes,
    encrypted: Bytes,
}

impl LandingFile {
    /// Content type and body for a request
    pub fn content(&self, encrypted: bool) -> (&str, Bytes) {
        if encrypted {
            (ENCRYPTED_CONTENT_TYPE, self.encrypted.clone())
        } else {
            (self.mime.as_str(), self.plain.clone())
        }
    }
}

/// Landing assets keyed by fake path, in configuration order
#[derive(Debug, Clone, Default)]
pub struct LandingStore {
    files: Vec<LandingFile>,
    index: HashMap<String, usize>,
}

impl LandingStore {
    /// Read every routed file from `dir`.
    ///
    /// Occurrences of `"root"` in scripts and pages are rewritten to the
    /// configured root element id.
    pub async fn load(
        dir: &Path,
        routes: &[LandingRoute],
        key: &str,
        root_element_id: &str,
    ) -> Result<Self, LandingError> {
        let mut entries = Vec::with_capacity(routes.len());

        for route in routes {
            let path = dir.join(&route.file);
            let mut content = tokio::fs::read(&path)
                .await
                .map_err(|source| LandingError::Read { path, source })?;

            if root_element_id != "root" && is_markup_or_script(&route.file) {
                content = replace_bytes(&content, b"\"root\"", format!("\"{}\"", root_element_id).as_bytes());
            }

            entries.push((route.clone(), content));
        }

        let store = Self::from_contents(entries, key)?;
        tracing::info!(count = store.len(), dir = %dir.display(), "Loaded landing files");
        Ok(store)
    }

    /// Build from in-memory contents
    pub fn from_contents(
        entries: Vec<(LandingRoute, Vec<u8>)>,
        key: &str,
    ) -> Result<Self, LandingError> {
        let xor = Xor::new(key)?;
        let mut store = Self::default();

        for (route, content) in entries {
            if !route.path.starts_with('/') {
                return Err(LandingError::InvalidPath(route.path));
            }
            if store.index.contains_key(&route.path) {
                return Err(LandingError::DuplicatePath(route.path));
            }

            let encrypted = STANDARD.encode(xor.xor(&content));
            let mime = mime_guess::from_path(&route.file)
                .first_or_octet_stream()
                .to_string();

            store.index.insert(route.path.clone(), store.files.len());
            store.files.push(LandingFile {
                name: route.file,
                path: route.path,
                mime,
                plain: Bytes::from(content),
                encrypted: Bytes::from(encrypted),
            });
        }

        Ok(store)
    }

    pub fn get(&self, path: &str) -> Option<&LandingFile> {
        self.index.get(path).map(|&i| &self.files[i])
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Assets the loader should fetch, classified by file type
    pub fn loader_assets(&self) -> LoaderAssets {
        let mut assets = LoaderAssets::default();

        for file in &self.files {
            let ext = Path::new(&file.name)
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();

            let rel = match ext.as_str() {
                "js" | "mjs" => {
                    assets.scripts.push(file.path.clone());
                    continue;
                }
                "css" => "stylesheet",
                "ico" | "png" | "svg" => "icon",
                "webmanifest" => "manifest",
                "json" if file.name.contains("manifest") => "manifest",
                _ => continue,
            };

            assets.links.push(LinkAsset {
                url: file.path.clone(),
                rel: rel.to_string(),
                mime: file.mime.clone(),
            });
        }

        assets
    }
}

fn is_markup_or_script(name: &str) -> bool {
    [".js", ".mjs", ".html", ".htm"]
        .iter()
        .any(|ext| name.to_ascii_lowercase().ends_with(ext))
}

fn replace_bytes(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}
