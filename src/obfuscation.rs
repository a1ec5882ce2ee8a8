//! Streaming Obfuscation Writer
//!
//! Two modes share one chain snapshot per request:
//! - buffered: a middleware collects the handler's body, applies the chain
//!   once and corrects `Content-Length` and `Content-Type`
//! - windowed: the download handler reads one range window, obfuscates it
//!   as an independent unit and marks the response so the buffered layer
//!   leaves it alone
//!
//! Only allow-listed statuses are rewritten. Everything else, including
//! `101 Switching Protocols`, passes through with body, headers and
//! upgrade extensions untouched.

use std::io::SeekFrom;
use std::path::Path;

use axum::{
    body::{Body, Bytes},
    extract::{FromRef, FromRequest, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::AppError;
use crate::range::Window;
use crate::transform::{ActiveChain, ChainHandle, TransformChain, TransformError};

/// Statuses whose bodies are obfuscated
pub const OBFUSCATED_STATUSES: [StatusCode; 4] = [
    StatusCode::OK,
    StatusCode::PARTIAL_CONTENT,
    StatusCode::NOT_ACCEPTABLE,
    StatusCode::CONFLICT,
];

/// Content type of every obfuscated body
pub const OBFUSCATED_CONTENT_TYPE: &str = "text/plain";

/// Response extension marking a body that is already obfuscated
#[derive(Debug, Clone, Copy)]
pub struct PreObfuscated;

pub fn is_obfuscated_status(status: StatusCode) -> bool {
    OBFUSCATED_STATUSES.contains(&status)
}

// ============================================================================
// Buffered Mode
// ============================================================================

/// Middleware obfuscating whole response bodies.
///
/// Also pins the request's chain snapshot so handlers and this layer agree
/// on the chain even if it is swapped mid-request.
pub async fn obfuscate_response(
    State(handle): State<ChainHandle>,
    mut request: Request,
    next: Next,
) -> Response {
    let chain = ActiveChain::pin(request.extensions_mut(), &handle);
    let response = next.run(request).await;

    if !is_obfuscated_status(response.status())
        || response.extensions().get::<PreObfuscated>().is_some()
    {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let plain = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let obfuscated = match chain.apply(&plain) {
        Ok(data) => data,
        Err(e) => {
            tracing::error!(error = %e, "Failed to obfuscate response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(obfuscated.len()));
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(OBFUSCATED_CONTENT_TYPE),
    );

    Response::from_parts(parts, Body::from(obfuscated))
}

// ============================================================================
// Windowed Mode
// ============================================================================

/// Read the plaintext bytes of `window` from `path`.
///
/// A file shorter than the window yields a short read rather than an error.
pub async fn read_window(path: &Path, window: Window) -> std::io::Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(window.start)).await?;

    let mut buf = Vec::with_capacity(window.len().min(64 * 1024 * 1024) as usize);
    file.take(window.len()).read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Obfuscate one window and build its response.
///
/// `Content-Range` stays in plaintext coordinates; `Content-Length` is the
/// obfuscated size. A whole-file window is returned as `200`.
pub fn window_response(
    chain: &TransformChain,
    plain: &[u8],
    window: Window,
    total: u64,
    partial: bool,
) -> Result<Response, TransformError> {
    let obfuscated = chain.apply(plain)?;

    let status = if partial {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut response = pre_obfuscated(status, obfuscated);
    let headers = response.headers_mut();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if partial {
        if let Ok(value) = HeaderValue::from_str(&window.content_range(total)) {
            headers.insert(header::CONTENT_RANGE, value);
        }
    }

    Ok(response)
}

/// Response for a body the handler already obfuscated
pub fn pre_obfuscated(status: StatusCode, obfuscated: Vec<u8>) -> Response {
    let mut response = (status, obfuscated).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(OBFUSCATED_CONTENT_TYPE),
    );
    response.extensions_mut().insert(PreObfuscated);
    response
}

// ============================================================================
// Request Bodies
// ============================================================================

/// Request body after inverting the request's chain.
///
/// Read or decode failures are rejected as a plain not found.
#[derive(Debug)]
pub struct DeobfuscatedBody(pub Vec<u8>);

#[axum::async_trait]
impl<S> FromRequest<S> for DeobfuscatedBody
where
    ChainHandle: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(mut req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let chain = ActiveChain::pin(req.extensions_mut(), &ChainHandle::from_ref(state));

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::NotFound(format!("Failed to read request body: {}", e)))?;

        let data = chain
            .invert(&body)
            .map_err(|e| AppError::NotFound(format!("Failed to deobfuscate request body: {}", e)))?;

        Ok(Self(data))
    }
}
