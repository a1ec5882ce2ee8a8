//! Application state management

use std::path::Path;
use std::sync::Arc;

use axum::extract::FromRef;
use axum::http::HeaderName;

use crate::config::Config;
use crate::landing::LandingStore;
use crate::loader::LoaderGenerator;
use crate::range::RangeHeaderOptions;
use crate::transform::ChainHandle;
use crate::upload::UploadManager;

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Invalid range header name: {0}")]
    RangeHeader(String),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    chain: ChainHandle,
    uploads: UploadManager,
    loader: LoaderGenerator,
    landing: LandingStore,
    range: RangeHeaderOptions,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The loader generator is built from the landing store's assets.
    pub fn new(
        config: Config,
        chain: ChainHandle,
        uploads: UploadManager,
        landing: LandingStore,
    ) -> Result<Self, StateError> {
        let name = HeaderName::try_from(config.range.header.as_str())
            .map_err(|_| StateError::RangeHeader(config.range.header.clone()))?;
        let range = RangeHeaderOptions::new(name, config.range.prefix.clone());

        let loader = LoaderGenerator::new(
            config.loader.uri_param.clone(),
            config.loader.root_element_id.clone(),
            landing.loader_assets(),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                chain,
                uploads,
                loader,
                landing,
                range,
            }),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Directory files are served from and uploaded into
    pub fn root_dir(&self) -> &Path {
        &self.inner.config.files.root_dir
    }

    /// Get the swappable transform chain
    pub fn chain(&self) -> &ChainHandle {
        &self.inner.chain
    }

    /// Get the upload manager
    pub fn uploads(&self) -> &UploadManager {
        &self.inner.uploads
    }

    pub fn loader(&self) -> &LoaderGenerator {
        &self.inner.loader
    }

    pub fn landing(&self) -> &LandingStore {
        &self.inner.landing
    }

    /// Configured range header name and prefix
    pub fn range(&self) -> &RangeHeaderOptions {
        &self.inner.range
    }
}

impl FromRef<AppState> for ChainHandle {
    fn from_ref(state: &AppState) -> Self {
        state.inner.chain.clone()
    }
}

impl FromRef<AppState> for RangeHeaderOptions {
    fn from_ref(state: &AppState) -> Self {
        state.inner.range.clone()
    }
}
