//! Centralized error types for the Soundscape core library.
//!
//! Each subsystem defines its own `thiserror` enum next to the code that
//! raises it and implements [`ErrorCode`] for it. [`SoundscapeError`] is the
//! application-wide error returned by the API layer; it maps to an HTTP
//! status and renders as a JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::cache::CacheError;
use crate::catalog::CatalogError;
use crate::mixer::MixerError;
use crate::player::PlayerError;
use crate::utils::TrackValidationError;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

/// Application-wide error type for the Soundscape service.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum SoundscapeError {
    /// Client sent an invalid or malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Requested sound does not exist in the catalog.
    #[error("Sound not found: {0}")]
    SoundNotFound(String),

    /// Catalog backend could not be reached or returned garbage.
    #[error("Catalog unavailable: {0}")]
    Catalog(String),

    /// The mixer actor is not running.
    #[error("Mixer unavailable: {0}")]
    MixerUnavailable(String),

    /// Audio cache failure (download, disk).
    #[error("Cache error: {0}")]
    Cache(String),

    /// Audio file could not be opened for playback.
    #[error("Playback error: {0}")]
    Playback(String),

    /// Server configuration error (missing or invalid settings).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SoundscapeError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::SoundNotFound(_) => "sound_not_found",
            Self::Catalog(_) => "catalog_unavailable",
            Self::MixerUnavailable(_) => "mixer_unavailable",
            Self::Cache(_) => "cache_error",
            Self::Playback(_) => "playback_error",
            Self::Configuration(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::SoundNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Catalog(_) => StatusCode::BAD_GATEWAY,
            Self::MixerUnavailable(_) | Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Type Aliases
// ─────────────────────────────────────────────────────────────────────────────

pub use crate::cache::CacheResult;
pub use crate::catalog::CatalogResult;
pub use crate::mixer::MixerResult;
pub use crate::player::PlayerResult;

/// Convenient Result alias for application-wide operations.
pub type SoundscapeResult<T> = Result<T, SoundscapeError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for SoundscapeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<CatalogError> for SoundscapeError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => Self::SoundNotFound(id),
            CatalogError::NotConfigured => Self::Configuration(err.to_string()),
            other => Self::Catalog(other.to_string()),
        }
    }
}

impl From<MixerError> for SoundscapeError {
    fn from(err: MixerError) -> Self {
        Self::MixerUnavailable(err.to_string())
    }
}

impl From<CacheError> for SoundscapeError {
    fn from(err: CacheError) -> Self {
        Self::Cache(err.to_string())
    }
}

impl From<PlayerError> for SoundscapeError {
    fn from(err: PlayerError) -> Self {
        Self::Playback(err.to_string())
    }
}

impl From<TrackValidationError> for SoundscapeError {
    fn from(err: TrackValidationError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}
