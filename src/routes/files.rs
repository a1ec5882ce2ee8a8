//! File serving routes
//!
//! Endpoints, under the download prefix:
//! - GET /*path - Download a file, or one range window of it
//! - PATCH /*path - Inspect a file or directory

use axum::{
    extract::State,
    http::{header, HeaderMap},
    middleware,
    response::Response,
    routing::get,
    Router,
};

use crate::codec::{decode_path, to_absolute};
use crate::error::{AppError, Result};
use crate::inspect::inspect;
use crate::obfuscation::{obfuscate_response, pre_obfuscated, read_window, window_response};
use crate::range::{parse_download_range, remap_range_header, Window};
use crate::routes::OpaquePath;
use crate::state::AppState;
use crate::transform::ActiveChain;

/// Create the files router
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/*path", get(download).patch(inspect_target))
        .layer(middleware::from_fn_with_state(
            state.chain().clone(),
            obfuscate_response,
        ))
        .layer(middleware::from_fn_with_state(
            state.range().clone(),
            remap_range_header,
        ))
}

/// GET /*path
///
/// Without a range the whole file is one window. Each window is obfuscated
/// on its own, so clients must re-request the same boundaries on retry.
async fn download(
    State(state): State<AppState>,
    chain: ActiveChain,
    OpaquePath(opaque): OpaquePath,
    headers: HeaderMap,
) -> Result<Response> {
    let relative = decode_path(&chain, &opaque)?;
    let absolute = to_absolute(state.root_dir(), &relative)?;

    let metadata = tokio::fs::metadata(&absolute)
        .await
        .map_err(|e| AppError::NotFound(format!("{}: {}", absolute.display(), e)))?;
    if metadata.is_dir() {
        return Err(AppError::NotFound(format!(
            "{} is a directory",
            absolute.display()
        )));
    }

    let total = metadata.len();
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let (window, partial) = match range {
        Some(value) => (parse_download_range(value, total)?, true),
        None => (Window { start: 0, end: total }, false),
    };

    let plain = read_window(&absolute, window)
        .await
        .map_err(|e| AppError::NotFound(format!("{}: {}", absolute.display(), e)))?;

    tracing::debug!(
        relative_path = %relative,
        start = window.start,
        end = window.end,
        total = total,
        "Serving file window"
    );

    Ok(window_response(&chain, &plain, window, total, partial)?)
}

/// PATCH /*path
async fn inspect_target(
    State(state): State<AppState>,
    chain: ActiveChain,
    OpaquePath(opaque): OpaquePath,
) -> Result<Response> {
    let body = inspect(state.root_dir(), &chain, &opaque).await?;
    Ok(pre_obfuscated(axum::http::StatusCode::OK, body))
}
