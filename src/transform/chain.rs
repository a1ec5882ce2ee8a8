//! Transform chains and the shared chain handle

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use parking_lot::RwLock;
use serde::Deserialize;

use super::algorithms::build_transform;
use super::types::{ChainBuildFailure, Transform, TransformConfig, TransformError};

// ============================================================================
// Transform Chain
// ============================================================================

/// Ordered list of transforms applied as one unit
#[derive(Default)]
pub struct TransformChain {
    transforms: Vec<Box<dyn Transform>>,
    configs: Vec<TransformConfig>,
}

impl TransformChain {
    /// A chain with no transforms. Data passes through unchanged.
    pub fn passthrough() -> Self {
        Self::default()
    }

    /// Build a chain from configuration records.
    ///
    /// Records that fail to build are skipped and returned alongside the
    /// chain so the caller can report each one by name.
    pub fn from_configs(configs: &[TransformConfig]) -> (Self, Vec<ChainBuildFailure>) {
        Self::build(configs.iter().cloned().map(Ok))
    }

    /// Build a chain from raw JSON records.
    ///
    /// A record that does not parse as a [`TransformConfig`] is reported at
    /// its position the same way as one that parses but fails to build.
    pub fn from_records(records: &[serde_json::Value]) -> (Self, Vec<ChainBuildFailure>) {
        Self::build(records.iter().enumerate().map(|(index, record)| {
            TransformConfig::deserialize(record).map_err(|e| ChainBuildFailure {
                index,
                algorithm: record
                    .get("algorithm")
                    .and_then(|a| a.as_str())
                    .unwrap_or("<missing>")
                    .to_string(),
                reason: e.to_string(),
            })
        }))
    }

    fn build<I>(records: I) -> (Self, Vec<ChainBuildFailure>)
    where
        I: Iterator<Item = Result<TransformConfig, ChainBuildFailure>>,
    {
        let mut chain = Self::default();
        let mut failures = Vec::new();

        for (index, record) in records.enumerate() {
            let config = match record {
                Ok(config) => config,
                Err(failure) => {
                    failures.push(failure);
                    continue;
                }
            };
            match build_transform(&config) {
                Ok(transform) => {
                    chain.transforms.push(transform);
                    chain.configs.push(config);
                }
                Err(e) => failures.push(ChainBuildFailure {
                    index,
                    algorithm: config.algorithm,
                    reason: e.to_string(),
                }),
            }
        }

        (chain, failures)
    }

    /// Build a chain and log every failed record
    pub fn from_configs_logged(configs: &[TransformConfig]) -> Self {
        log_build(Self::from_configs(configs))
    }

    /// [`Self::from_records`], logging every failed record
    pub fn from_records_logged(records: &[serde_json::Value]) -> Self {
        log_build(Self::from_records(records))
    }

    /// Run every transform forward, in list order
    pub fn apply(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        let mut out = data.to_vec();
        for transform in &self.transforms {
            out = transform.apply(&out)?;
        }
        Ok(out)
    }

    /// Run every inverse, in reverse list order
    pub fn invert(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        let mut out = data.to_vec();
        for transform in self.transforms.iter().rev() {
            out = transform.invert(&out)?;
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Configuration records of the transforms that were built
    pub fn configs(&self) -> &[TransformConfig] {
        &self.configs
    }
}

impl fmt::Display for TransformChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.transforms.is_empty() {
            return f.write_str("passthrough");
        }
        let names: Vec<&str> = self.transforms.iter().map(|t| t.name()).collect();
        f.write_str(&names.join(" -> "))
    }
}

impl fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformChain")
            .field("transforms", &self.to_string())
            .finish()
    }
}

fn log_build((chain, failures): (TransformChain, Vec<ChainBuildFailure>)) -> TransformChain {
    for failure in &failures {
        tracing::error!(
            index = failure.index,
            algorithm = %failure.algorithm,
            reason = %failure.reason,
            "Failed to build transform, skipping"
        );
    }

    if chain.is_empty() {
        tracing::warn!("No usable transforms configured, data will pass through unobfuscated");
    } else {
        tracing::info!(chain = %chain, "Transform chain ready");
    }

    chain
}

// ============================================================================
// Chain Handle
// ============================================================================

/// Process-wide chain, swappable at runtime.
///
/// Readers take a snapshot with [`ChainHandle::current`] and keep using it
/// for the rest of their work. A swap never affects snapshots already taken.
#[derive(Clone, Default)]
pub struct ChainHandle {
    inner: Arc<RwLock<Arc<TransformChain>>>,
}

impl ChainHandle {
    pub fn new(chain: TransformChain) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(chain))),
        }
    }

    /// Snapshot of the active chain
    pub fn current(&self) -> Arc<TransformChain> {
        self.inner.read().clone()
    }

    /// Swap in a new chain, returning the previous one
    pub fn replace(&self, chain: TransformChain) -> Arc<TransformChain> {
        let next = Arc::new(chain);
        tracing::info!(chain = %next, "Transform chain replaced");
        std::mem::replace(&mut *self.inner.write(), next)
    }
}

impl fmt::Debug for ChainHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ChainHandle").field(&*self.current()).finish()
    }
}

// ============================================================================
// Per-request snapshot
// ============================================================================

/// Chain snapshot pinned to one request.
///
/// The first extraction pins the chain into the request extensions; every
/// later extraction in the same request sees the same snapshot.
#[derive(Clone, Debug)]
pub struct ActiveChain(pub Arc<TransformChain>);

impl ActiveChain {
    /// Pin the current chain into `extensions` unless one is already pinned
    pub fn pin(extensions: &mut axum::http::Extensions, handle: &ChainHandle) -> Self {
        if let Some(active) = extensions.get::<ActiveChain>() {
            return active.clone();
        }
        let active = ActiveChain(handle.current());
        extensions.insert(active.clone());
        active
    }
}

impl std::ops::Deref for ActiveChain {
    type Target = TransformChain;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ActiveChain
where
    ChainHandle: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::pin(&mut parts.extensions, &ChainHandle::from_ref(state)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_configs() -> Vec<TransformConfig> {
        vec![
            TransformConfig::new("xor").with_option("key", "abc"),
            TransformConfig::new("reverse"),
            TransformConfig::new("aes").with_option("key", "passphrase"),
            TransformConfig::new("base64").with_option("alphabet", "url"),
        ]
    }

    #[test]
    fn test_round_trip() {
        let (chain, failures) = TransformChain::from_configs(&sample_configs());
        assert!(failures.is_empty());
        assert_eq!(chain.len(), 4);

        for data in [&b""[..], b"a", b"hello world", &[0u8, 255, 1, 254][..]] {
            let enc = chain.apply(data).unwrap();
            assert_eq!(chain.invert(&enc).unwrap(), data);
        }
    }

    #[test]
    fn test_order_is_significant() {
        let forward = TransformChain::from_configs(&[
            TransformConfig::new("xor").with_option("key", "k"),
            TransformConfig::new("base64"),
        ])
        .0;
        let swapped = TransformChain::from_configs(&[
            TransformConfig::new("base64"),
            TransformConfig::new("xor").with_option("key", "k"),
        ])
        .0;

        let enc = forward.apply(b"payload").unwrap();
        assert_ne!(enc, swapped.apply(b"payload").unwrap());
        // Output of the forward chain ends in base64, so it is printable
        assert!(enc.iter().all(|b| b.is_ascii_graphic()));
        assert!(swapped.invert(&enc).map(|d| d != b"payload").unwrap_or(true));
    }

    #[test]
    fn test_failures_are_collected_per_record() {
        let configs = vec![
            TransformConfig::new("base64"),
            TransformConfig::new("xor"),
            TransformConfig::new("bogus"),
            TransformConfig::new("reverse"),
        ];
        let (chain, failures) = TransformChain::from_configs(&configs);

        assert_eq!(chain.to_string(), "base64 -> reverse");
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].index, 1);
        assert_eq!(failures[0].algorithm, "xor");
        assert_eq!(failures[1].index, 2);
        assert_eq!(failures[1].algorithm, "bogus");
    }

    #[test]
    fn test_malformed_records_are_skipped_in_place() {
        let records: Vec<serde_json::Value> = serde_json::from_str(
            r#"[
                {"algorithm": "aes", "options": {"key": "passphrase"}},
                {"algorithm": "xor", "options": {"key": 1}},
                {"options": {}},
                {"algorithm": "bogus"},
                {"algorithm": "base64"}
            ]"#,
        )
        .unwrap();
        let (chain, failures) = TransformChain::from_records(&records);

        assert_eq!(chain.to_string(), "aes -> base64");
        let reported: Vec<(usize, &str)> = failures
            .iter()
            .map(|f| (f.index, f.algorithm.as_str()))
            .collect();
        assert_eq!(reported, vec![(1, "xor"), (2, "<missing>"), (3, "bogus")]);
    }

    #[test]
    fn test_empty_chain_passes_through() {
        let chain = TransformChain::from_configs_logged(&[TransformConfig::new("nope")]);
        assert!(chain.is_empty());
        assert_eq!(chain.apply(b"plain").unwrap(), b"plain");
        assert_eq!(chain.invert(b"plain").unwrap(), b"plain");
    }

    #[test]
    fn test_invert_reports_decode_failure() {
        let chain = TransformChain::from_configs(&[TransformConfig::new("base64")]).0;
        assert!(chain.invert(b"%%%").is_err());
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let handle = ChainHandle::new(TransformChain::from_configs(&[TransformConfig::new("reverse")]).0);
        let before = handle.current();

        handle.replace(TransformChain::passthrough());

        assert_eq!(before.apply(b"ab").unwrap(), b"ba");
        assert_eq!(handle.current().apply(b"ab").unwrap(), b"ab");
    }

    #[test]
    fn test_pin_is_stable_within_request() {
        let handle = ChainHandle::new(TransformChain::from_configs(&[TransformConfig::new("reverse")]).0);
        let mut extensions = axum::http::Extensions::new();

        let first = ActiveChain::pin(&mut extensions, &handle);
        handle.replace(TransformChain::passthrough());
        let second = ActiveChain::pin(&mut extensions, &handle);

        assert!(Arc::ptr_eq(&first.0, &second.0));
    }
}
