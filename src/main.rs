//! Shroud Server
//!
//! Serves and receives files through an obfuscating transform chain, with
//! resumable uploads and a randomized bootstrap loader for the front end.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shroud_server::config::{read_chain_file, Config};
use shroud_server::landing::LandingStore;
use shroud_server::routes;
use shroud_server::state::AppState;
use shroud_server::transform::{ChainHandle, TransformChain};
use shroud_server::upload::UploadManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "shroud_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Invalid configuration")?;

    tracing::info!("Starting Shroud Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Root directory: {}", config.files.root_dir.display());
    if std::env::var("SHROUD_LOADER_KEY").map_or(true, |k| k.is_empty()) {
        tracing::info!(key = %config.loader.key, "Generated loader key");
    }

    tokio::fs::create_dir_all(&config.files.root_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.files.root_dir.display()))?;

    // Transform chain
    let records = config.chain_records().context("Failed to load transform chain")?;
    let chain = ChainHandle::new(TransformChain::from_records_logged(&records));

    // Uploads
    let uploads = UploadManager::load(
        config.uploads.registrants_file.clone(),
        chrono::Duration::hours(config.uploads.max_upload_hours),
    )
    .await
    .context("Failed to load registrants")?;
    tracing::info!("Restored {} pending uploads", uploads.len().await);

    let sweeper = uploads.clone().start_sweeper(std::time::Duration::from_secs(
        config.uploads.sweep_interval_secs,
    ));

    // Landing assets
    let landing = match &config.loader.landing_dir {
        Some(dir) => LandingStore::load(
            dir,
            &config.loader.landing_routes,
            &config.loader.key,
            &config.loader.root_element_id,
        )
        .await
        .context("Failed to load landing assets")?,
        None => LandingStore::default(),
    };

    if let Some(path) = config.chain.file.clone() {
        tokio::spawn(reload_on_hangup(path, chain.clone()));
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;

    // Create application state and router
    let app_state = AppState::new(config, chain, uploads, landing)?;
    let app = routes::router(app_state);

    // Start server with graceful shutdown
    tracing::info!("Shroud Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Re-read the chain file on every SIGHUP. A failed reload keeps the
/// active chain.
#[cfg(unix)]
async fn reload_on_hangup(path: std::path::PathBuf, chain: ChainHandle) {
    let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGHUP handler, chain reload disabled");
            return;
        }
    };

    while hangup.recv().await.is_some() {
        match read_chain_file(&path) {
            Ok(records) => {
                chain.replace(TransformChain::from_records_logged(&records));
            }
            Err(e) => {
                tracing::error!(error = %e, "Chain reload failed, keeping active chain");
            }
        }
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup(_path: std::path::PathBuf, _chain: ChainHandle) {}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
