//! Configuration management for Shroud Server

use std::env;
use std::path::PathBuf;

use serde::Deserialize;

use crate::landing::LandingRoute;
use crate::upload::{DEFAULT_MAX_UPLOAD_HOURS, DEFAULT_SWEEP_INTERVAL_SECS};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub files: FilesConfig,
    pub uploads: UploadConfig,
    pub range: RangeConfig,
    pub chain: ChainConfig,
    pub loader: LoaderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty disables the CORS layer
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    /// Directory served and written under
    pub root_dir: PathBuf,
    /// Route prefix for downloads and inspection
    pub download_route: String,
    /// Route prefix for uploads
    pub upload_route: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub registrants_file: PathBuf,
    pub max_upload_hours: i64,
    pub sweep_interval_secs: u64,
    /// Largest accepted chunk body, in bytes
    pub max_chunk_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RangeConfig {
    pub header: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// JSON array of transform records, re-read on reload
    pub file: Option<PathBuf>,
    /// Records used when no file is configured. Kept as raw JSON so one
    /// malformed record is reported on its own by the chain builder.
    pub inline: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    pub js_route: String,
    pub html_route: String,
    pub auto_html_route: String,
    /// Key the landing assets are XOR-encrypted with
    pub key: String,
    pub uri_param: String,
    pub root_element_id: String,
    pub landing_dir: Option<PathBuf>,
    /// Landing files in load order
    pub landing_routes: Vec<LandingRoute>,
}

/// Default chunk body limit: 64 MiB
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 64 * 1024 * 1024;

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8443,
                cors_origins: Vec::new(),
            },
            files: FilesConfig {
                root_dir: PathBuf::from("./webroot"),
                download_route: "/files".to_string(),
                upload_route: "/upload".to_string(),
            },
            uploads: UploadConfig {
                registrants_file: PathBuf::from("./registrants.json"),
                max_upload_hours: DEFAULT_MAX_UPLOAD_HOURS,
                sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
                max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            },
            range: RangeConfig {
                header: "Range".to_string(),
                prefix: "bytes".to_string(),
            },
            chain: ChainConfig {
                file: None,
                inline: Vec::new(),
            },
            loader: LoaderConfig {
                js_route: "/loader.js".to_string(),
                html_route: "/loader.html".to_string(),
                auto_html_route: "/auto.html".to_string(),
                key: crate::loader::identifiers::random_token(32, 32),
                uri_param: "crypt".to_string(),
                root_element_id: "root".to_string(),
                landing_dir: None,
                landing_routes: Vec::new(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
                cors_origins: env::var("SHROUD_CORS_ORIGINS")
                    .map(|v| {
                        v.split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            files: FilesConfig {
                root_dir: env::var("SHROUD_ROOT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.files.root_dir),
                download_route: route_var("SHROUD_DOWNLOAD_ROUTE", defaults.files.download_route)?,
                upload_route: route_var("SHROUD_UPLOAD_ROUTE", defaults.files.upload_route)?,
            },
            uploads: UploadConfig {
                registrants_file: env::var("SHROUD_REGISTRANTS_FILE")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.uploads.registrants_file),
                max_upload_hours: parse_var("SHROUD_MAX_UPLOAD_HOURS", defaults.uploads.max_upload_hours)?,
                sweep_interval_secs: parse_var(
                    "SHROUD_SWEEP_INTERVAL_SECS",
                    defaults.uploads.sweep_interval_secs,
                )?
                .max(1),
                max_chunk_bytes: parse_var("SHROUD_MAX_CHUNK_BYTES", defaults.uploads.max_chunk_bytes)?,
            },
            range: RangeConfig {
                header: env::var("SHROUD_RANGE_HEADER").unwrap_or(defaults.range.header),
                prefix: env::var("SHROUD_RANGE_PREFIX").unwrap_or(defaults.range.prefix),
            },
            chain: ChainConfig {
                file: env::var("SHROUD_CHAIN_FILE").ok().map(PathBuf::from),
                inline: json_var("SHROUD_CHAIN")?.unwrap_or_default(),
            },
            loader: LoaderConfig {
                js_route: route_var("SHROUD_LOADER_JS_ROUTE", defaults.loader.js_route)?,
                html_route: route_var("SHROUD_LOADER_HTML_ROUTE", defaults.loader.html_route)?,
                auto_html_route: route_var("SHROUD_LOADER_AUTO_HTML_ROUTE", defaults.loader.auto_html_route)?,
                key: env::var("SHROUD_LOADER_KEY")
                    .ok()
                    .filter(|k| !k.is_empty())
                    .unwrap_or(defaults.loader.key),
                uri_param: env::var("SHROUD_LOADER_URI_PARAM").unwrap_or(defaults.loader.uri_param),
                root_element_id: env::var("SHROUD_ROOT_ELEMENT_ID")
                    .unwrap_or(defaults.loader.root_element_id),
                landing_dir: env::var("SHROUD_LANDING_DIR").ok().map(PathBuf::from),
                landing_routes: json_var("SHROUD_LANDING_ROUTES")?.unwrap_or_default(),
            },
        })
    }

    /// Transform records from the chain file, or the inline records when no
    /// file is configured
    pub fn chain_records(&self) -> Result<Vec<serde_json::Value>, ConfigError> {
        match &self.chain.file {
            Some(path) => read_chain_file(path),
            None => Ok(self.chain.inline.clone()),
        }
    }
}

/// Read a JSON array of transform records.
///
/// Only the array itself is checked here. Each record is validated when
/// the chain is built.
pub fn read_chain_file(path: &std::path::Path) -> Result<Vec<serde_json::Value>, ConfigError> {
    let data = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|e| ConfigError::Invalid {
        name: "SHROUD_CHAIN_FILE",
        reason: e.to_string(),
    })
}

fn parse_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn json_var<T: serde::de::DeserializeOwned>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => serde_json::from_str(&value)
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
        _ => Ok(None),
    }
}

/// Route prefixes must be absolute and must not end in `/`
fn route_var(name: &'static str, default: String) -> Result<String, ConfigError> {
    let route = env::var(name).unwrap_or(default);
    let trimmed = route.trim_end_matches('/');
    if !route.starts_with('/') || trimmed.is_empty() {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("route must start with '/' and not be the root: {:?}", route),
        });
    }
    Ok(trimmed.to_string())
}
