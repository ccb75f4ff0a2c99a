//! Fixed constants shared across the service.
//!
//! Tunable values live in [`Config`](crate::state::Config); the values here are
//! either part of the on-disk/wire format or defaults the config falls back to.

// ─────────────────────────────────────────────────────────────────────────────
// Service Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Service identifier reported by the health endpoint.
pub const SERVICE_ID: &str = "soundscape";

/// Application name used for desktop notifications.
pub const APP_NAME: &str = "Soundscape";

// ─────────────────────────────────────────────────────────────────────────────
// Notification
// ─────────────────────────────────────────────────────────────────────────────

/// Title of the persistent notification shown while any sound is active.
pub const NOTIFICATION_TITLE: &str = "relaxation sounds active";

/// Icon name passed to the desktop notification daemon.
pub const NOTIFICATION_ICON: &str = "audio-x-generic";

// ─────────────────────────────────────────────────────────────────────────────
// Cache Layout
// ─────────────────────────────────────────────────────────────────────────────

/// Prefix for cached sound files: `<cache_dir>/sound_<id>.<ext>`.
pub const CACHE_FILE_PREFIX: &str = "sound_";

/// Extension used when the source URL does not carry one.
pub const DEFAULT_AUDIO_EXTENSION: &str = "mp3";

/// Suffix for in-progress downloads. Files with this suffix are never
/// returned by the cache and are purged on startup.
pub const PARTIAL_FILE_SUFFIX: &str = "part";

/// Longest extension accepted from a URL before falling back to the default.
pub const MAX_EXTENSION_LEN: usize = 5;

// ─────────────────────────────────────────────────────────────────────────────
// Download
// ─────────────────────────────────────────────────────────────────────────────

/// Retry delays for transient download failures (exponential backoff).
pub const DOWNLOAD_RETRY_DELAYS_MS: [u64; 3] = [200, 500, 1000];

/// Default upper bound for one track load (download + decoder open).
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Connect and per-read timeout of the shared HTTP client.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;

/// Catalog listing path, relative to the configured catalog base URL.
pub const CATALOG_SOUNDS_PATH: &str = "relax/sounds";

// ─────────────────────────────────────────────────────────────────────────────
// Channels
// ─────────────────────────────────────────────────────────────────────────────

/// Default capacity of the mixer command channel.
pub const DEFAULT_COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Default capacity of the event broadcast channel for WebSocket clients.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket
// ─────────────────────────────────────────────────────────────────────────────

/// Seconds without client traffic before a WebSocket is dropped.
pub const WS_HEARTBEAT_TIMEOUT_SECS: u64 = 30;

/// Interval between heartbeat timeout checks.
pub const WS_HEARTBEAT_CHECK_INTERVAL_SECS: u64 = 5;

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Server
// ─────────────────────────────────────────────────────────────────────────────

/// Port range scanned when no preferred port is configured.
pub const PORT_RANGE_START: u16 = 49500;

/// Last port of the auto-allocation range (inclusive).
pub const PORT_RANGE_END: u16 = 49510;
