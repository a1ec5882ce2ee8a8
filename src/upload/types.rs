//! Upload types

use std::path::PathBuf;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Default lifetime of a registered upload: 24 hours
pub const DEFAULT_MAX_UPLOAD_HOURS: i64 = 24;

/// Default interval between expiration sweeps
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

// ============================================================================
// Upload
// ============================================================================

/// One resumable upload in progress.
///
/// This is the record persisted in the registrant file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    /// Destination on the server filesystem
    pub absolute_path: PathBuf,

    /// Client-visible key, unique among active uploads
    pub relative_path: String,

    /// Upload is canceled by the sweeper once this has passed
    pub expiration: DateTime<Utc>,
}

impl Upload {
    pub fn new(absolute_path: PathBuf, relative_path: String, max_duration: chrono::Duration) -> Self {
        Self {
            absolute_path,
            relative_path,
            expiration: Utc::now() + max_duration,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expiration
    }
}

/// Lifecycle of a registered upload.
///
/// `Completed`, `Canceled` and `Expired` are terminal; an entry in a
/// terminal state has already left the registrant table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    /// Registered, no chunk written yet
    Registered,
    /// At least one chunk written
    Receiving,
    /// Deregistered by the client, file left in place
    Completed,
    /// Canceled by the client, partial file removed
    Canceled,
    /// Canceled by the sweeper, partial file removed
    Expired,
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::Expired)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Upload error types
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Upload already registered: {0}")]
    AlreadyRegistered(String),

    #[error("File already exists: {0}")]
    FileExists(PathBuf),

    #[error("Upload not found: {0}")]
    NotFound(String),

    #[error("Upload directory doesn't exist: {0}")]
    DirectoryMissing(PathBuf),

    #[error("Destination file must have a value")]
    EmptyPath,

    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("Failed to load registrants: {0}")]
    Load(String),
}

impl UploadError {
    /// Whether this error is a registration conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyRegistered(_) | Self::FileExists(_))
    }

    /// HTTP status code for this error when returned from registration
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AlreadyRegistered(_) | Self::FileExists(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::DirectoryMissing(_) | Self::EmptyPath | Self::Filesystem(_) => {
                StatusCode::NOT_ACCEPTABLE
            }
            Self::Load(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_serializes_rfc3339() {
        let upload = Upload {
            absolute_path: PathBuf::from("/srv/root/a.bin"),
            relative_path: "/a.bin".to_string(),
            expiration: DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
                .unwrap()
                .with_timezone(&Utc),
        };

        let json = serde_json::to_value(&upload).unwrap();
        assert_eq!(json["absolute_path"], "/srv/root/a.bin");
        assert_eq!(json["relative_path"], "/a.bin");
        assert_eq!(json["expiration"], "2026-01-02T03:04:05Z");
    }

    #[test]
    fn test_expiry() {
        let fresh = Upload::new("/x".into(), "/x".into(), chrono::Duration::hours(1));
        let stale = Upload::new("/x".into(), "/x".into(), chrono::Duration::seconds(-1));
        assert!(!fresh.is_expired());
        assert!(stale.is_expired());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!UploadState::Registered.is_terminal());
        assert!(!UploadState::Receiving.is_terminal());
        assert!(UploadState::Completed.is_terminal());
        assert!(UploadState::Canceled.is_terminal());
        assert!(UploadState::Expired.is_terminal());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(UploadError::AlreadyRegistered("/a".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(UploadError::FileExists("/a".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(UploadError::DirectoryMissing("/d".into()).status_code(), StatusCode::NOT_ACCEPTABLE);
        assert_eq!(UploadError::NotFound("/a".into()).status_code(), StatusCode::NOT_FOUND);
    }
}
