//! Route modules for Shroud Server

pub mod files;
pub mod health;
pub mod landing;
pub mod loader;
pub mod upload;

use axum::{
    extract::{FromRequestParts, Path},
    http::{header, request::Parts, HeaderValue},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::AppState;

/// Fields shared by every JSON response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseResponse {
    pub success: bool,
    #[serde(rename = "msg")]
    pub message: String,
}

impl BaseResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Opaque path segment captured by a `/*path` route.
///
/// The capture leaves off the separator in front of it, which is put back
/// here so the codec sees the segment as it appeared on the wire. An
/// encoding that itself begins with `/` keeps that character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaquePath(pub String);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for OpaquePath {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(captured) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::NotFound(e.to_string()))?;
        Ok(Self(format!("/{}", captured)))
    }
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let config = state.config().clone();

    let mut app = Router::new()
        .route("/health", get(health::health_check))
        .nest(&config.files.download_route, files::router(&state))
        .nest(&config.files.upload_route, upload::router(&state))
        .merge(loader::router(&config.loader))
        .fallback(landing::serve_landing)
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(&config.server.cors_origins, &config.range.header) {
        app = app.layer(cors);
    }

    app.with_state(state)
}

/// CORS layer for the configured origins, or `None` when there are none
fn cors_layer(origins: &[String], range_header: &str) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    let mut expose = vec![header::CONTENT_RANGE, header::CONTENT_LENGTH, header::ACCEPT_RANGES];
    if let Ok(name) = header::HeaderName::try_from(range_header) {
        expose.push(name);
    }

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(expose),
    )
}
