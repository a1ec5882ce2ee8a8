//! Upload Lifecycle Manager
//!
//! Tracks registered uploads with two lock tiers:
//! - the table lock guards membership and is held for every
//!   read-modify-write of the table, including persistence
//! - each upload's own lock serializes chunk writes, completion and
//!   cancellation for that upload only
//!
//! Lock order: an upload lock may be held while taking the table lock,
//! never the reverse. Table lock holders never wait on an upload lock,
//! so the sweeper and concurrent chunk writers cannot deadlock.

use std::collections::{BTreeMap, HashMap};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::types::{Upload, UploadError, UploadState};

// ============================================================================
// Registrant
// ============================================================================

/// Table entry: the persisted record plus its own lock
struct Registrant {
    upload: Upload,
    state: Mutex<UploadState>,
}

impl Registrant {
    fn new(upload: Upload) -> Arc<Self> {
        Arc::new(Self {
            upload,
            state: Mutex::new(UploadState::Registered),
        })
    }
}

type Table = HashMap<String, Arc<Registrant>>;

// ============================================================================
// Upload Manager
// ============================================================================

/// Manages registered uploads and their registrant file
#[derive(Clone)]
pub struct UploadManager {
    inner: Arc<UploadManagerInner>,
}

struct UploadManagerInner {
    /// Active uploads indexed by relative path
    table: Mutex<Table>,

    /// Snapshot file rewritten after every mutation
    registrants_file: Option<PathBuf>,

    /// Lifetime granted to new uploads
    max_duration: chrono::Duration,
}

impl UploadManager {
    /// Create a manager with no persistence
    pub fn in_memory(max_duration: chrono::Duration) -> Self {
        Self::from_parts(Table::new(), None, max_duration)
    }

    /// Create a manager seeded from `registrants_file`.
    ///
    /// A missing or empty file yields an empty table. Only bookkeeping is
    /// restored; partial file content is left as-is on disk.
    pub async fn load(
        registrants_file: PathBuf,
        max_duration: chrono::Duration,
    ) -> Result<Self, UploadError> {
        let uploads: HashMap<String, Upload> = match tokio::fs::read(&registrants_file).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                UploadError::Load(format!("{}: {}", registrants_file.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        let table: Table = uploads
            .into_iter()
            .map(|(key, upload)| (key, Registrant::new(upload)))
            .collect();

        tracing::info!(
            count = table.len(),
            file = %registrants_file.display(),
            "Loaded upload registrants"
        );

        Ok(Self::from_parts(table, Some(registrants_file), max_duration))
    }

    fn from_parts(table: Table, registrants_file: Option<PathBuf>, max_duration: chrono::Duration) -> Self {
        Self {
            inner: Arc::new(UploadManagerInner {
                table: Mutex::new(table),
                registrants_file,
                max_duration,
            }),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Register a new upload.
    ///
    /// Fails when the relative path is already registered, when a file
    /// already occupies the destination, or when the destination's parent
    /// directory is missing.
    pub async fn register(
        &self,
        absolute_path: PathBuf,
        relative_path: String,
    ) -> Result<Upload, UploadError> {
        if relative_path.is_empty() || absolute_path.as_os_str().is_empty() {
            return Err(UploadError::EmptyPath);
        }

        let mut table = self.inner.table.lock().await;

        if table.contains_key(&relative_path) {
            tracing::warn!(relative_path = %relative_path, "Upload already registered");
            return Err(UploadError::AlreadyRegistered(relative_path));
        }

        if tokio::fs::try_exists(&absolute_path).await? {
            tracing::warn!(absolute_path = %absolute_path.display(), "Upload destination already exists");
            return Err(UploadError::FileExists(absolute_path));
        }

        if let Some(parent) = absolute_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let is_dir = tokio::fs::metadata(parent)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if !is_dir {
                return Err(UploadError::DirectoryMissing(parent.to_path_buf()));
            }
        }

        let upload = Upload::new(absolute_path, relative_path, self.inner.max_duration);
        table.insert(upload.relative_path.clone(), Registrant::new(upload.clone()));
        self.persist(&table).await;

        tracing::info!(
            relative_path = %upload.relative_path,
            expiration = %upload.expiration,
            "Created new upload"
        );

        Ok(upload)
    }

    /// Write `data` at `offset` in the upload's destination file.
    ///
    /// Writes are positioned, not appended, so retried or out-of-order
    /// chunks land in the same place.
    pub async fn save_chunk(
        &self,
        relative_path: &str,
        data: &[u8],
        offset: u64,
    ) -> Result<(), UploadError> {
        let registrant = self.registrant(relative_path).await?;
        let mut state = registrant.state.lock().await;

        // Canceled or completed between lookup and lock
        if state.is_terminal() {
            return Err(UploadError::NotFound(relative_path.to_string()));
        }

        write_at(&registrant.upload.absolute_path, data, offset)
            .await
            .map_err(|e| {
                tracing::error!(
                    relative_path = %relative_path,
                    offset = offset,
                    error = %e,
                    "Failed to write upload chunk"
                );
                UploadError::Filesystem(e)
            })?;

        *state = UploadState::Receiving;

        tracing::debug!(
            relative_path = %relative_path,
            offset = offset,
            size = data.len(),
            "Chunk written"
        );

        Ok(())
    }

    /// Mark an upload complete. The file is left in place.
    pub async fn deregister(&self, relative_path: &str) -> Result<(), UploadError> {
        let registrant = self.registrant(relative_path).await?;
        let mut state = registrant.state.lock().await;

        if state.is_terminal() {
            return Err(UploadError::NotFound(relative_path.to_string()));
        }

        self.remove(&registrant).await;
        *state = UploadState::Completed;

        tracing::info!(relative_path = %relative_path, "Upload finished");
        Ok(())
    }

    /// Abort an upload, deleting any partial file
    pub async fn cancel_upload(&self, relative_path: &str) -> Result<(), UploadError> {
        let registrant = self.registrant(relative_path).await?;
        let mut state = registrant.state.lock().await;

        if state.is_terminal() {
            return Err(UploadError::NotFound(relative_path.to_string()));
        }

        let result = self.retire(&registrant).await;
        *state = UploadState::Canceled;

        tracing::info!(relative_path = %relative_path, "Canceled upload");
        result
    }

    /// Cancel every expired upload that is not busy.
    ///
    /// Uploads whose lock is held, typically mid chunk write, are skipped
    /// and reconsidered on the next sweep. Returns the number canceled.
    pub async fn scan_expired(&self) -> usize {
        let registrants: Vec<Arc<Registrant>> = {
            let table = self.inner.table.lock().await;
            table.values().cloned().collect()
        };

        let mut expired = 0;
        for registrant in registrants {
            let Ok(mut state) = registrant.state.try_lock() else {
                tracing::debug!(
                    relative_path = %registrant.upload.relative_path,
                    "Upload busy, skipping expiration check"
                );
                continue;
            };

            if state.is_terminal() || !registrant.upload.is_expired() {
                continue;
            }

            tracing::info!(relative_path = %registrant.upload.relative_path, "Upload expired");
            if let Err(e) = self.retire(&registrant).await {
                tracing::warn!(
                    relative_path = %registrant.upload.relative_path,
                    error = %e,
                    "Failed to remove expired upload file"
                );
            }
            *state = UploadState::Expired;
            expired += 1;
        }

        if expired > 0 {
            tracing::info!(count = expired, "Cleaned up expired uploads");
        }

        expired
    }

    /// Start the background expiration sweep
    pub fn start_sweeper(self, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "Starting upload expiration scanner");
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;
                self.scan_expired().await;
            }
        })
    }

    // ========================================================================
    // Query Methods
    // ========================================================================

    /// Snapshot of one upload
    pub async fn get(&self, relative_path: &str) -> Result<Upload, UploadError> {
        Ok(self.registrant(relative_path).await?.upload.clone())
    }

    /// Whether `relative_path` is registered
    pub async fn exists(&self, relative_path: &str) -> bool {
        self.inner.table.lock().await.contains_key(relative_path)
    }

    /// Consistent snapshot of every active upload, ordered by relative path
    pub async fn list_all(&self) -> Vec<Upload> {
        let table = self.inner.table.lock().await;
        let mut uploads: Vec<Upload> = table.values().map(|r| r.upload.clone()).collect();
        uploads.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        uploads
    }

    pub async fn len(&self) -> usize {
        self.inner.table.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn registrant(&self, relative_path: &str) -> Result<Arc<Registrant>, UploadError> {
        let table = self.inner.table.lock().await;
        table
            .get(relative_path)
            .cloned()
            .ok_or_else(|| UploadError::NotFound(relative_path.to_string()))
    }

    /// Remove the partial file, then the table entry. The caller holds
    /// the registrant's lock. The entry is removed even when the file
    /// cannot be deleted.
    async fn retire(&self, registrant: &Arc<Registrant>) -> Result<(), UploadError> {
        let result = match tokio::fs::remove_file(&registrant.upload.absolute_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(UploadError::Filesystem(e)),
        };
        self.remove(registrant).await;
        result
    }

    /// Remove the entry from the table and persist. The caller holds the
    /// registrant's lock.
    async fn remove(&self, registrant: &Arc<Registrant>) {
        let mut table = self.inner.table.lock().await;
        let key = &registrant.upload.relative_path;
        if table.get(key).is_some_and(|current| Arc::ptr_eq(current, registrant)) {
            table.remove(key);
            self.persist(&table).await;
        }
    }

    /// Rewrite the registrant file. Failures are logged; in-memory state
    /// stays authoritative.
    async fn persist(&self, table: &Table) {
        let Some(path) = &self.inner.registrants_file else {
            return;
        };

        let snapshot: BTreeMap<&str, &Upload> = table
            .iter()
            .map(|(key, registrant)| (key.as_str(), &registrant.upload))
            .collect();

        if let Err(e) = write_snapshot(path, &snapshot).await {
            tracing::warn!(
                file = %path.display(),
                error = %e,
                "Failed to write upload registrant file"
            );
        }
    }
}

/// Positioned write into `path`, creating it if needed
async fn write_at(path: &Path, data: &[u8], offset: u64) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .await?;
    file.seek(SeekFrom::Start(offset)).await?;
    file.write_all(data).await?;
    file.flush().await
}

/// Write the snapshot to a sibling temp file and rename it into place
async fn write_snapshot(path: &Path, snapshot: &BTreeMap<&str, &Upload>) -> std::io::Result<()> {
    let data = serde_json::to_vec_pretty(snapshot)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "registrants".to_string());
    let temp = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    tokio::fs::write(&temp, &data).await?;
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e);
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
