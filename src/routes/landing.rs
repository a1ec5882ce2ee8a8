//! Landing asset routes
//!
//! Served from the router fallback so configured fake paths can never
//! clash with the fixed routes.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::state::AppState;

/// Serve the landing asset at the request path, encrypted when the crypt
/// query parameter is present
pub async fn serve_landing(
    State(state): State<AppState>,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let Some(file) = state.landing().get(uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let encrypted = query.contains_key(&state.config().loader.uri_param);
    let (mime, body) = file.content(encrypted);

    tracing::debug!(path = %file.path, encrypted = encrypted, "Serving landing asset");

    (
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        body,
    )
        .into_response()
}
