//! Transform types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Transform Trait
// ============================================================================

/// A single reversible byte transform
pub trait Transform: Send + Sync {
    /// Algorithm name as it appears in configuration
    fn name(&self) -> &'static str;

    /// Obfuscate `data`
    fn apply(&self, data: &[u8]) -> Result<Vec<u8>, TransformError>;

    /// Reverse `apply`
    fn invert(&self, data: &[u8]) -> Result<Vec<u8>, TransformError>;
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration record for one transform in a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Algorithm name (`base64`, `xor`, `aes`, `reverse`)
    pub algorithm: String,

    /// Algorithm specific options
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl TransformConfig {
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            options: BTreeMap::new(),
        }
    }

    /// Builder-style option setter
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub(crate) fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

/// A configuration record that could not be turned into a transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBuildFailure {
    /// Position of the record in the configured list
    pub index: usize,

    /// Algorithm named by the record
    pub algorithm: String,

    /// Why construction failed
    pub reason: String,
}

// ============================================================================
// Error Types
// ============================================================================

/// Transform error types
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Missing option '{option}' for {algorithm}")]
    MissingOption {
        algorithm: &'static str,
        option: &'static str,
    },

    #[error("Invalid option '{option}' for {algorithm}: {reason}")]
    InvalidOption {
        algorithm: &'static str,
        option: &'static str,
        reason: String,
    },

    #[error("{algorithm} encode failed: {reason}")]
    Encode {
        algorithm: &'static str,
        reason: String,
    },

    #[error("{algorithm} decode failed: {reason}")]
    Decode {
        algorithm: &'static str,
        reason: String,
    },
}

impl TransformError {
    pub(crate) fn encode(algorithm: &'static str, reason: impl ToString) -> Self {
        Self::Encode {
            algorithm,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn decode(algorithm: &'static str, reason: impl ToString) -> Self {
        Self::Decode {
            algorithm,
            reason: reason.to_string(),
        }
    }
}
