//! Shroud Server Library
//!
//! Obfuscated file transfer: paths, bodies and file windows pass through a
//! configurable transform chain, uploads are resumable and tracked on disk,
//! and the browser front end is delivered by a randomized bootstrap loader.
//! The server binary is in main.rs.
//!
//! # Modules
//!
//! - `transform`: Reversible transforms and the swappable chain
//! - `codec`: Opaque path decoding
//! - `obfuscation`: Buffered and windowed response obfuscation
//! - `upload`: Resumable upload lifecycle
//! - `loader`: Bootstrap loader generation
//! - `inspect`: Directory and file inspection

pub mod codec;
pub mod config;
pub mod error;
pub mod inspect;
pub mod landing;
pub mod loader;
pub mod obfuscation;
pub mod range;
pub mod routes;
pub mod state;
pub mod transform;
pub mod upload;
