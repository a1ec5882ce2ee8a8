//! Transform Chain
//!
//! Ordered, reversible byte transforms applied as one obfuscation unit:
//! - `apply` runs each transform forward in list order
//! - `invert` runs each inverse in reverse list order
//! - Chains are shared as immutable snapshots behind a swappable handle
//!
//! Chain construction never fails as a whole. Records that cannot be
//! built are reported individually and the remaining transforms are used.

pub mod algorithms;
pub mod chain;
pub mod types;

pub use algorithms::{build_transform, Aes, Base64, Reverse, Xor};
pub use chain::{ActiveChain, ChainHandle, TransformChain};
pub use types::*;
