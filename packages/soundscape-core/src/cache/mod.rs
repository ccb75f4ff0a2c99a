//! Disk-backed, download-once cache mapping track ids to local files.
//!
//! [`CacheStore::ensure`] returns a completed file immediately when one exists.
//! Otherwise it streams the resource into a uniquely named `*.part` file and
//! renames it into place only after the body has been fully written, so no
//! reader ever observes a partial file. Concurrent `ensure` calls for the same
//! track are serialized on a per-file async lock, giving one transfer per id.

pub mod layout;
mod retry;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::error::ErrorCode;
use crate::protocol_constants::DOWNLOAD_RETRY_DELAYS_MS;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors produced while resolving a cache entry.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Transport-level failure (DNS, connect, timeout, truncated body).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-2xx status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { status: u16, url: String },

    /// Transfer completed but produced zero bytes.
    #[error("download of {0} produced no data")]
    Empty(String),

    /// Local filesystem failure (create, write, rename).
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Returns true for failures worth retrying: timeouts, connection errors,
    /// interrupted bodies, 5xx and 429 responses.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            Self::Empty(_) | Self::Io(_) => false,
        }
    }
}

impl ErrorCode for CacheError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "download_request_failed",
            Self::HttpStatus { .. } => "download_http_status",
            Self::Empty(_) => "download_empty",
            Self::Io(_) => "cache_io_error",
        }
    }
}

/// Convenient Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

// ─────────────────────────────────────────────────────────────────────────────
// Partial File Guard
// ─────────────────────────────────────────────────────────────────────────────

/// Temporary download target that deletes itself unless persisted.
///
/// Dropping the guard (error, timeout, or a cancelled `ensure` future) removes
/// the file, so an abandoned transfer never leaves bytes behind.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(final_path: &Path) -> Self {
        Self {
            path: layout::partial_path(final_path),
            armed: true,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically moves the completed download to `final_path`.
    async fn persist(mut self, final_path: &Path) -> CacheResult<()> {
        tokio::fs::rename(&self.path, final_path).await?;
        self.armed = false;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("[Cache] Discarded partial file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "[Cache] Failed to remove partial file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Download Lock
// ─────────────────────────────────────────────────────────────────────────────

type LockMap = DashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// A reference to one per-file lock in the store's lock map.
///
/// Dropping it removes the map entry when no other caller holds or waits on
/// the same lock. This also runs when an `ensure` future is dropped mid-wait.
struct DownloadLock<'a> {
    locks: &'a LockMap,
    key: String,
    mutex: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> DownloadLock<'a> {
    fn acquire(locks: &'a LockMap, key: String) -> Self {
        let mutex = locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        Self { locks, key, mutex }
    }
}

impl Drop for DownloadLock<'_> {
    fn drop(&mut self) {
        // Two references left: the map's and ours.
        self.locks.remove_if(&self.key, |_, m| {
            Arc::ptr_eq(m, &self.mutex) && Arc::strong_count(m) == 2
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache Store
// ─────────────────────────────────────────────────────────────────────────────

/// Maps track ids to completed audio files under a cache directory.
pub struct CacheStore {
    dir: PathBuf,
    client: Client,
    /// Per-file download locks, keyed by final file name.
    locks: LockMap,
    retry_delays: Vec<Duration>,
    /// Number of transfers that completed and were renamed into place.
    completed_downloads: AtomicU64,
}

impl CacheStore {
    /// Creates a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>, client: Client) -> CacheResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            client,
            locks: DashMap::new(),
            retry_delays: retry::delays_from_millis(&DOWNLOAD_RETRY_DELAYS_MS),
            completed_downloads: AtomicU64::new(0),
        })
    }

    /// Overrides the backoff schedule for transient failures.
    #[must_use]
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    /// Returns the cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the final path a track is (or will be) stored at.
    pub fn path_for(&self, id: &str, url: &str) -> PathBuf {
        self.dir.join(layout::file_name(id, url))
    }

    /// Returns the cached file for a track if a completed, non-empty one exists.
    ///
    /// Only stats the file; never touches the network.
    pub fn lookup(&self, id: &str, url: &str) -> Option<PathBuf> {
        let path = self.path_for(id, url);
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Some(path),
            _ => None,
        }
    }

    /// Number of downloads completed by this store since creation.
    pub fn completed_downloads(&self) -> u64 {
        self.completed_downloads.load(Ordering::Relaxed)
    }

    /// Returns the local path for a track, downloading it first if needed.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] for network failures, non-2xx responses,
    /// zero-byte bodies and filesystem errors. No partial file is left behind
    /// in any of these cases.
    pub async fn ensure(&self, id: &str, url: &str) -> CacheResult<PathBuf> {
        if let Some(path) = self.lookup(id, url) {
            log::debug!("[Cache] Hit for {}: {}", id, path.display());
            return Ok(path);
        }

        let final_path = self.path_for(id, url);
        let lock = DownloadLock::acquire(&self.locks, layout::file_name(id, url));
        let _guard = lock.mutex.lock().await;

        // Another caller may have finished the download while we waited.
        if let Some(path) = self.lookup(id, url) {
            log::debug!("[Cache] {} completed by concurrent request", id);
            return Ok(path);
        }

        retry::with_retry(id, &self.retry_delays, || self.download(url, &final_path))
            .await
            .map(|()| final_path)
    }

    /// Streams `url` into a partial file and renames it to `final_path`.
    async fn download(&self, url: &str, final_path: &Path) -> CacheResult<()> {
        log::info!("[Cache] Downloading {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let partial = PartialFile::new(final_path);
        let mut file = tokio::fs::File::create(partial.path()).await?;
        let mut body = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if written == 0 {
            return Err(CacheError::Empty(url.to_string()));
        }

        partial.persist(final_path).await?;
        self.completed_downloads.fetch_add(1, Ordering::Relaxed);
        log::info!(
            "[Cache] Stored {} ({} bytes) at {}",
            url,
            written,
            final_path.display()
        );
        Ok(())
    }

    /// Deletes the cached file for a track.
    ///
    /// Used when a cached file fails to decode so the next request downloads
    /// a fresh copy. Returns whether a file was removed.
    pub async fn evict(&self, id: &str, url: &str) -> CacheResult<bool> {
        let path = self.path_for(id, url);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                log::warn!("[Cache] Evicted {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes partial files left behind by a previous process.
    ///
    /// Must only run before any download starts (i.e. at bootstrap); it does
    /// not coordinate with in-flight transfers.
    pub fn purge_partials(&self) -> CacheResult<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if layout::is_partial_name(name) && entry.file_type()?.is_file() {
                std::fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        if removed > 0 {
            log::info!("[Cache] Purged {} stale partial file(s)", removed);
        }
        Ok(removed)
    }
}
