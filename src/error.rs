//! Error types for the Shroud server
//!
//! Decode, lookup and filesystem failures all leave the server as the same
//! bare `404`, so a probing client cannot tell a wrong key from a missing
//! file. The detail is logged server-side only.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::codec::PathError;
use crate::inspect::InspectError;
use crate::loader::LoaderError;
use crate::range::RangeError;
use crate::routes::BaseResponse;
use crate::transform::TransformError;
use crate::upload::UploadError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not acceptable: {0}")]
    NotAcceptable(String),

    #[error("Range error: {0}")]
    Range(#[from] RangeError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            AppError::Range(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PathError> for AppError {
    fn from(e: PathError) -> Self {
        AppError::NotFound(e.to_string())
    }
}

impl From<InspectError> for AppError {
    fn from(e: InspectError) -> Self {
        AppError::NotFound(e.to_string())
    }
}

impl From<UploadError> for AppError {
    fn from(e: UploadError) -> Self {
        match e.status_code() {
            StatusCode::CONFLICT => AppError::Conflict(e.to_string()),
            StatusCode::NOT_ACCEPTABLE => AppError::NotAcceptable(e.to_string()),
            StatusCode::NOT_FOUND => AppError::NotFound(e.to_string()),
            _ => AppError::Internal(e.to_string()),
        }
    }
}

impl From<TransformError> for AppError {
    fn from(e: TransformError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<LoaderError> for AppError {
    fn from(e: LoaderError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound(detail) => {
                tracing::warn!(detail = %detail, "Request flattened to not found");
                StatusCode::NOT_FOUND.into_response()
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, Json(BaseResponse::failure(msg))).into_response()
            }
            AppError::NotAcceptable(msg) => {
                (StatusCode::NOT_ACCEPTABLE, Json(BaseResponse::failure(msg))).into_response()
            }
            AppError::Range(e) => {
                tracing::debug!(error = %e, "Range rejected");
                let mut response = StatusCode::RANGE_NOT_SATISFIABLE.into_response();
                if let RangeError::Unsatisfiable(total) = e {
                    if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", total)) {
                        response.headers_mut().insert(header::CONTENT_RANGE, value);
                    }
                }
                response
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
