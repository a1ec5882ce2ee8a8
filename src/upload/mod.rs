//! Resumable Upload Module
//!
//! Tracks uploads that arrive as offset-addressed chunks:
//! - Register reserves a relative path and a destination file
//! - Chunks are written at their offset, so retries and reordering are safe
//! - Completion leaves the file; cancellation and expiry delete it
//!
//! Bookkeeping is persisted to a JSON registrant file after every change so
//! pending uploads are still known after a restart.

pub mod manager;
pub mod types;

pub use manager::UploadManager;
pub use types::*;
