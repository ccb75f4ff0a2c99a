//! General utilities shared across the application.

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Time Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Request Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Longest track id accepted from clients.
const MAX_TRACK_ID_LEN: usize = 128;

/// Reasons a client-supplied track descriptor is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackValidationError {
    #[error("track id must not be empty")]
    EmptyId,
    #[error("track id exceeds {MAX_TRACK_ID_LEN} characters")]
    IdTooLong,
    #[error("audio URL must be http or https: {0}")]
    UnsupportedUrl(String),
}

/// Validates a track id and audio URL received over the API.
///
/// Ids are used to derive cache file names, so they must be non-empty and
/// bounded. URLs must be absolute `http(s)` URLs.
pub fn validate_track_request(id: &str, audio_url: &str) -> Result<(), TrackValidationError> {
    if id.trim().is_empty() {
        return Err(TrackValidationError::EmptyId);
    }
    if id.chars().count() > MAX_TRACK_ID_LEN {
        return Err(TrackValidationError::IdTooLong);
    }
    match reqwest::Url::parse(audio_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(TrackValidationError::UnsupportedUrl(audio_url.to_string())),
    }
}

/// Formats `count` with a singular or plural noun ("1 sound", "3 sounds").
pub(crate) fn count_noun(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_millis_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn accepts_http_and_https_urls() {
        assert!(validate_track_request("rain", "https://x/rain.mp3").is_ok());
        assert!(validate_track_request("rain", "http://10.0.0.2/rain.ogg").is_ok());
    }

    #[test]
    fn rejects_bad_ids_and_urls() {
        assert_eq!(
            validate_track_request("  ", "https://x/rain.mp3"),
            Err(TrackValidationError::EmptyId)
        );
        assert_eq!(
            validate_track_request(&"a".repeat(129), "https://x/rain.mp3"),
            Err(TrackValidationError::IdTooLong)
        );
        assert!(matches!(
            validate_track_request("rain", "file:///etc/passwd"),
            Err(TrackValidationError::UnsupportedUrl(_))
        ));
        assert!(matches!(
            validate_track_request("rain", "not a url"),
            Err(TrackValidationError::UnsupportedUrl(_))
        ));
    }

    #[test]
    fn count_noun_pluralizes() {
        assert_eq!(count_noun(1, "sound", "sounds"), "1 sound");
        assert_eq!(count_noun(0, "sound", "sounds"), "0 sounds");
        assert_eq!(count_noun(4, "sound", "sounds"), "4 sounds");
    }
}
