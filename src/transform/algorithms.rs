//! Concrete transforms
//!
//! Each transform is built from a [`TransformConfig`] record by
//! [`build_transform`]. Every `apply` is deterministic so that the same
//! input always obfuscates to the same output under one chain.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::types::{Transform, TransformConfig, TransformError};

type HmacSha256 = Hmac<Sha256>;

/// PBKDF2 rounds used to stretch AES passphrases
pub const AES_KDF_ROUNDS: u32 = 100_000;

/// Salt used when the `aes` record does not name one
pub const AES_DEFAULT_SALT: &str = "shroud";

const AES_NONCE_LEN: usize = 12;

/// Build a transform from its configuration record
pub fn build_transform(config: &TransformConfig) -> Result<Box<dyn Transform>, TransformError> {
    match config.algorithm.to_ascii_lowercase().as_str() {
        "base64" => Ok(Box::new(Base64::from_config(config)?)),
        "xor" => Ok(Box::new(Xor::from_config(config)?)),
        "aes" => Ok(Box::new(Aes::from_config(config)?)),
        "reverse" => Ok(Box::new(Reverse)),
        other => Err(TransformError::UnknownAlgorithm(other.to_string())),
    }
}

// ============================================================================
// Base64
// ============================================================================

/// Base64 encoding, standard or URL-safe alphabet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Base64 {
    url_safe: bool,
}

impl Base64 {
    pub fn standard() -> Self {
        Self { url_safe: false }
    }

    pub fn url_safe() -> Self {
        Self { url_safe: true }
    }

    fn from_config(config: &TransformConfig) -> Result<Self, TransformError> {
        match config.option("alphabet").unwrap_or("standard") {
            "standard" => Ok(Self::standard()),
            "url" => Ok(Self::url_safe()),
            other => Err(TransformError::InvalidOption {
                algorithm: "base64",
                option: "alphabet",
                reason: format!("expected 'standard' or 'url', got '{}'", other),
            }),
        }
    }
}

impl Transform for Base64 {
    fn name(&self) -> &'static str {
        "base64"
    }

    fn apply(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        let encoded = if self.url_safe {
            URL_SAFE.encode(data)
        } else {
            STANDARD.encode(data)
        };
        Ok(encoded.into_bytes())
    }

    fn invert(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        let decoded = if self.url_safe {
            URL_SAFE.decode(data)
        } else {
            STANDARD.decode(data)
        };
        decoded.map_err(|e| TransformError::decode("base64", e))
    }
}

// ============================================================================
// XOR
// ============================================================================

/// Repeating-key XOR
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xor {
    key: Vec<u8>,
}

impl Xor {
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self, TransformError> {
        let key = key.into();
        if key.is_empty() {
            return Err(TransformError::InvalidOption {
                algorithm: "xor",
                option: "key",
                reason: "key must not be empty".to_string(),
            });
        }
        Ok(Self { key })
    }

    fn from_config(config: &TransformConfig) -> Result<Self, TransformError> {
        let key = config.option("key").ok_or(TransformError::MissingOption {
            algorithm: "xor",
            option: "key",
        })?;
        Self::new(key.as_bytes())
    }

    /// XOR `data` against the repeating key
    pub fn xor(&self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .zip(self.key.iter().cycle())
            .map(|(b, k)| b ^ k)
            .collect()
    }
}

impl Transform for Xor {
    fn name(&self) -> &'static str {
        "xor"
    }

    fn apply(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        Ok(self.xor(data))
    }

    fn invert(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        Ok(self.xor(data))
    }
}

// ============================================================================
// AES-256-GCM
// ============================================================================

/// AES-256-GCM with a synthetic nonce.
///
/// The nonce is the first 12 bytes of HMAC-SHA256(key, plaintext) and is
/// written in front of the ciphertext. Identical plaintexts therefore
/// produce identical output, which keeps `apply` deterministic.
pub struct Aes {
    cipher: Aes256Gcm,
    key: [u8; 32],
}

impl Aes {
    /// Derive the cipher key from a passphrase and salt
    pub fn new(passphrase: &str, salt: &str) -> Result<Self, TransformError> {
        if passphrase.is_empty() {
            return Err(TransformError::InvalidOption {
                algorithm: "aes",
                option: "key",
                reason: "key must not be empty".to_string(),
            });
        }

        let mut key = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(
            passphrase.as_bytes(),
            salt.as_bytes(),
            AES_KDF_ROUNDS,
            &mut key,
        );
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

        Ok(Self { cipher, key })
    }

    fn from_config(config: &TransformConfig) -> Result<Self, TransformError> {
        let passphrase = config.option("key").ok_or(TransformError::MissingOption {
            algorithm: "aes",
            option: "key",
        })?;
        Self::new(passphrase, config.option("salt").unwrap_or(AES_DEFAULT_SALT))
    }

    fn synthetic_nonce(&self, data: &[u8]) -> Result<[u8; AES_NONCE_LEN], TransformError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key)
            .map_err(|e| TransformError::encode("aes", e))?;
        mac.update(data);
        let digest = mac.finalize().into_bytes();

        let mut nonce = [0u8; AES_NONCE_LEN];
        nonce.copy_from_slice(&digest[..AES_NONCE_LEN]);
        Ok(nonce)
    }
}

impl Transform for Aes {
    fn name(&self) -> &'static str {
        "aes"
    }

    fn apply(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        let nonce_bytes = self.synthetic_nonce(data)?;
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), data)
            .map_err(|_| TransformError::encode("aes", "encryption failed"))?;

        let mut out = Vec::with_capacity(AES_NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn invert(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        if data.len() < AES_NONCE_LEN {
            return Err(TransformError::decode("aes", "ciphertext too short"));
        }
        let (nonce, ciphertext) = data.split_at(AES_NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| TransformError::decode("aes", "authentication failed"))
    }
}

// ============================================================================
// Reverse
// ============================================================================

/// Byte order reversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reverse;

impl Transform for Reverse {
    fn name(&self) -> &'static str {
        "reverse"
    }

    fn apply(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        Ok(data.iter().rev().copied().collect())
    }

    fn invert(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        self.apply(data)
    }
}
