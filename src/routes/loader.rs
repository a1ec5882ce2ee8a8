//! Loader routes
//!
//! Every request receives a freshly generated artifact.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::config::LoaderConfig;
use crate::error::Result;
use crate::state::AppState;

const NO_STORE: &str = "no-store";

pub fn router(config: &LoaderConfig) -> Router<AppState> {
    Router::new()
        .route(&config.js_route, get(loader_script))
        .route(&config.html_route, get(manual_page))
        .route(&config.auto_html_route, get(auto_page))
}

/// Stage 0 script
async fn loader_script(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let script = state.loader().generate()?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/javascript"),
            (header::CACHE_CONTROL, NO_STORE),
        ],
        script,
    ))
}

/// Page displaying the loader for the operator to run by hand
async fn manual_page(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let page = state.loader().manual_html()?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, NO_STORE),
        ],
        page,
    ))
}

/// Page running the loader on load
async fn auto_page(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let page = state.loader().auto_html()?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, NO_STORE),
        ],
        page,
    ))
}
