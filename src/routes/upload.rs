//! Upload Routes
//!
//! Endpoints, under the upload prefix:
//! - GET / - List active uploads
//! - PUT /*path - Register an upload
//! - POST /*path - Write one chunk at the offset named by the range header
//! - PATCH /*path - Mark an upload complete
//! - DELETE /*path - Cancel an upload and remove its partial file
//!
//! Request paths and bodies arrive obfuscated; JSON responses leave through
//! the buffered obfuscation layer.

use std::path::PathBuf;

use axum::{
    extract::{DefaultBodyLimit, FromRequestParts, State},
    http::{request::Parts, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::codec::{decode_path, to_absolute};
use crate::error::{AppError, Result};
use crate::obfuscation::{obfuscate_response, DeobfuscatedBody};
use crate::range::{parse_upload_range, UploadRange};
use crate::routes::{BaseResponse, OpaquePath};
use crate::state::AppState;
use crate::transform::ActiveChain;
use crate::upload::Upload;

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    #[serde(flatten)]
    pub base: BaseResponse,
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    #[serde(flatten)]
    pub base: BaseResponse,
    pub uploads: Vec<Upload>,
}

// ============================================================================
// Extractors
// ============================================================================

/// Decoded upload destination
#[derive(Debug, Clone)]
pub struct UploadPath {
    pub relative: String,
    pub absolute: PathBuf,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for UploadPath {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let OpaquePath(opaque) = OpaquePath::from_request_parts(parts, state).await?;
        let chain = ActiveChain::pin(&mut parts.extensions, state.chain());

        let relative = decode_path(&chain, &opaque)?;
        if !relative.starts_with('/') {
            return Err(AppError::NotAcceptable(format!(
                "Upload path must start with '/': {}",
                relative
            )));
        }
        let absolute = to_absolute(state.root_dir(), &relative)?;

        Ok(Self { relative, absolute })
    }
}

/// Chunk range from the configured header
#[derive(Debug, Clone, Copy)]
pub struct ChunkRange(pub UploadRange);

#[axum::async_trait]
impl FromRequestParts<AppState> for ChunkRange {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let options = state.range();
        let range = parse_upload_range(options.value(&parts.headers), &options.prefix)?;
        Ok(Self(range))
    }
}

// ============================================================================
// Router
// ============================================================================

/// Create the upload router
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_uploads))
        .route(
            "/*path",
            axum::routing::put(register)
                .post(receive_chunk)
                .patch(complete)
                .delete(cancel),
        )
        .layer(DefaultBodyLimit::max(state.config().uploads.max_chunk_bytes))
        .layer(middleware::from_fn_with_state(
            state.chain().clone(),
            obfuscate_response,
        ))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /
async fn list_uploads(State(state): State<AppState>) -> Json<ListResponse> {
    let uploads = state.uploads().list_all().await;
    Json(ListResponse {
        base: BaseResponse::success(format!("{} active uploads", uploads.len())),
        uploads,
    })
}

/// PUT /*path
///
/// Conflicts answer 409; every other failure answers 406.
async fn register(State(state): State<AppState>, target: UploadPath) -> Response {
    match state
        .uploads()
        .register(target.absolute, target.relative.clone())
        .await
    {
        Ok(upload) => Json(RegisterResponse {
            base: BaseResponse::success("Upload registered"),
            path: upload.relative_path,
        })
        .into_response(),
        Err(e) => {
            let status = if e.is_conflict() {
                StatusCode::CONFLICT
            } else {
                tracing::warn!(relative_path = %target.relative, error = %e, "Registration failed");
                StatusCode::NOT_ACCEPTABLE
            };
            (
                status,
                Json(RegisterResponse {
                    base: BaseResponse::failure(e.to_string()),
                    path: target.relative,
                }),
            )
                .into_response()
        }
    }
}

/// POST /*path
///
/// Only the range start positions the write; the body defines the span.
async fn receive_chunk(
    State(state): State<AppState>,
    target: UploadPath,
    ChunkRange(range): ChunkRange,
    DeobfuscatedBody(data): DeobfuscatedBody,
) -> Result<Json<BaseResponse>> {
    state
        .uploads()
        .save_chunk(&target.relative, &data, range.start)
        .await
        .map_err(|e| AppError::NotFound(e.to_string()))?;

    Ok(Json(BaseResponse::success(format!(
        "Wrote {} bytes at {}",
        data.len(),
        range.start
    ))))
}

/// PATCH /*path
async fn complete(State(state): State<AppState>, target: UploadPath) -> Result<Json<BaseResponse>> {
    state
        .uploads()
        .deregister(&target.relative)
        .await
        .map_err(|e| AppError::NotFound(e.to_string()))?;

    Ok(Json(BaseResponse::success("Upload complete")))
}

/// DELETE /*path
async fn cancel(State(state): State<AppState>, target: UploadPath) -> Result<Json<BaseResponse>> {
    state
        .uploads()
        .cancel_upload(&target.relative)
        .await
        .map_err(|e| AppError::NotFound(e.to_string()))?;

    Ok(Json(BaseResponse::success("Upload canceled")))
}
