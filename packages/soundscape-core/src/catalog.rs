//! Sound catalog: the list of available tracks from the content backend.
//!
//! The backend serves `GET {base}/relax/sounds` as a JSON array. The list is
//! fetched once and cached until [`CatalogService::refresh`] is called. The
//! mixer itself only needs a [`TrackDescriptor`]; the catalog exists so that
//! clients can toggle a sound by id alone.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorCode;
use crate::events::{CatalogEvent, EventEmitter};
use crate::protocol_constants::CATALOG_SOUNDS_PATH;
use crate::utils::now_millis;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// The minimum the mixer needs to play a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDescriptor {
    pub id: String,
    pub audio_url: String,
}

impl TrackDescriptor {
    pub fn new(id: impl Into<String>, audio_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            audio_url: audio_url.into(),
        }
    }
}

/// One entry as served by the content backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub icon_url: String,
    pub audio_url: String,
    #[serde(default)]
    pub is_premium: bool,
}

impl CatalogEntry {
    pub fn descriptor(&self) -> TrackDescriptor {
        TrackDescriptor::new(self.id.clone(), self.audio_url.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog returned HTTP {0}")]
    HttpStatus(u16),

    #[error("no catalog URL configured")]
    NotConfigured,

    #[error("sound not in catalog: {0}")]
    NotFound(String),
}

impl ErrorCode for CatalogError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "catalog_request_failed",
            Self::HttpStatus(_) => "catalog_http_status",
            Self::NotConfigured => "catalog_not_configured",
            Self::NotFound(_) => "sound_not_found",
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Source of catalog entries.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn fetch_sounds(&self) -> CatalogResult<Vec<CatalogEntry>>;
}

/// Fetches the catalog over HTTP.
pub struct HttpCatalogClient {
    client: Client,
    base_url: String,
}

impl HttpCatalogClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn sounds_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            CATALOG_SOUNDS_PATH
        )
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn fetch_sounds(&self) -> CatalogResult<Vec<CatalogEntry>> {
        let url = self.sounds_url();
        log::debug!("[Catalog] GET {}", url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::HttpStatus(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

/// Caches the catalog and resolves ids to descriptors.
pub struct CatalogService {
    client: Option<Arc<dyn CatalogClient>>,
    entries: RwLock<Option<Arc<Vec<CatalogEntry>>>>,
    /// Serializes fetches so concurrent first requests share one round-trip.
    fetch_lock: tokio::sync::Mutex<()>,
    emitter: Arc<dyn EventEmitter>,
}

impl CatalogService {
    /// Creates a service. With `client = None` every lookup fails with
    /// [`CatalogError::NotConfigured`].
    pub fn new(client: Option<Arc<dyn CatalogClient>>, emitter: Arc<dyn EventEmitter>) -> Self {
        Self {
            client,
            entries: RwLock::new(None),
            fetch_lock: tokio::sync::Mutex::new(()),
            emitter,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Returns the cached catalog, fetching it on first use.
    pub async fn list(&self) -> CatalogResult<Arc<Vec<CatalogEntry>>> {
        if let Some(entries) = self.entries.read().clone() {
            return Ok(entries);
        }
        let _fetch = self.fetch_lock.lock().await;
        if let Some(entries) = self.entries.read().clone() {
            return Ok(entries);
        }
        self.fetch().await
    }

    /// Fetches the catalog again, replacing the cached copy.
    pub async fn refresh(&self) -> CatalogResult<Arc<Vec<CatalogEntry>>> {
        let _fetch = self.fetch_lock.lock().await;
        self.fetch().await
    }

    async fn fetch(&self) -> CatalogResult<Arc<Vec<CatalogEntry>>> {
        let client = self.client.as_ref().ok_or(CatalogError::NotConfigured)?;
        let entries = Arc::new(client.fetch_sounds().await?);
        log::info!("[Catalog] Loaded {} sound(s)", entries.len());
        *self.entries.write() = Some(Arc::clone(&entries));
        self.emitter.emit_catalog(CatalogEvent::Refreshed {
            count: entries.len(),
            timestamp: now_millis(),
        });
        Ok(entries)
    }

    /// Resolves a catalog id to a playable descriptor.
    pub async fn resolve(&self, id: &str) -> CatalogResult<TrackDescriptor> {
        self.list()
            .await?
            .iter()
            .find(|entry| entry.id == id)
            .map(CatalogEntry::descriptor)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }
}
