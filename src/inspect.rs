//! Directory/File Inspector
//!
//! Lists a directory, or describes a single file, addressed by an opaque
//! path. The JSON result is obfuscated with the same chain that decoded
//! the request path.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::{decode_path, to_absolute, PathError};
use crate::transform::{TransformChain, TransformError};

/// Inspector error types
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("Failed to stat {path}: {source}")]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize inspection result: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to obfuscate inspection result: {0}")]
    Obfuscate(#[from] TransformError),
}

/// Inspection result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectResponse {
    /// Decoded relative path that was inspected
    pub target: String,
    pub entries: Vec<FileInfo>,
}

/// Lightweight description of one file or directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    /// Permission bits
    pub mode: u32,
    pub mod_time: DateTime<Utc>,
    pub is_dir: bool,
}

impl FileInfo {
    fn from_metadata(name: String, metadata: &Metadata) -> Self {
        Self {
            name,
            size: metadata.len(),
            mode: permission_bits(metadata),
            mod_time: metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_default(),
            is_dir: metadata.is_dir(),
        }
    }
}

#[cfg(unix)]
fn permission_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(metadata: &Metadata) -> u32 {
    match (metadata.is_dir(), metadata.permissions().readonly()) {
        (true, _) => 0o755,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}

/// Decode `opaque`, then describe what it names under `root`
pub async fn inspect_path(
    root: &Path,
    chain: &TransformChain,
    opaque: &str,
) -> Result<InspectResponse, InspectError> {
    let target = decode_path(chain, opaque)?;
    let absolute = to_absolute(root, &target)?;

    let metadata = tokio::fs::metadata(&absolute)
        .await
        .map_err(|source| InspectError::Stat {
            path: absolute.clone(),
            source,
        })?;

    let entries = if metadata.is_dir() {
        list_directory(&absolute).await?
    } else {
        let name = absolute
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| target.clone());
        vec![FileInfo::from_metadata(name, &metadata)]
    };

    Ok(InspectResponse { target, entries })
}

/// [`inspect_path`], serialized to JSON and obfuscated
pub async fn inspect(
    root: &Path,
    chain: &TransformChain,
    opaque: &str,
) -> Result<Vec<u8>, InspectError> {
    let response = inspect_path(root, chain, opaque).await?;
    let json = serde_json::to_vec(&response)?;
    Ok(chain.apply(&json)?)
}

/// Entries of `dir` sorted by name. Entries that vanish between listing
/// and stat are skipped.
async fn list_directory(dir: &Path) -> Result<Vec<FileInfo>, InspectError> {
    let read_err = |source: std::io::Error| InspectError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut reader = tokio::fs::read_dir(dir).await.map_err(read_err)?;
    let mut entries = Vec::new();

    while let Some(entry) = reader.next_entry().await.map_err(read_err)? {
        let name = entry.file_name().to_string_lossy().into_owned();
        match entry.metadata().await {
            Ok(metadata) => entries.push(FileInfo::from_metadata(name, &metadata)),
            Err(e) => {
                tracing::debug!(name = %name, error = %e, "Skipping entry that could not be stat'd");
            }
        }
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
