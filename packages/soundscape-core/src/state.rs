//! Core configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mixer::MixerOptions;
use crate::protocol_constants::{
    DEFAULT_COMMAND_CHANNEL_CAPACITY, DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS,
    EVENT_CHANNEL_CAPACITY, SERVICE_ID, WS_HEARTBEAT_CHECK_INTERVAL_SECS,
    WS_HEARTBEAT_TIMEOUT_SECS,
};

/// Configuration for the Soundscape service.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    // Server
    /// Preferred port for the HTTP/WS server (0 = auto-allocate).
    pub preferred_port: u16,

    // Cache
    /// Directory holding downloaded audio files.
    pub cache_dir: PathBuf,

    /// Upper bound for one track load, download plus decoder open (seconds).
    pub download_timeout_secs: u64,

    /// Connect and per-read timeout of the shared HTTP client (seconds).
    pub http_timeout_secs: u64,

    // Mixer
    /// Capacity of the mixer command channel.
    pub command_channel_capacity: usize,

    /// Capacity of the event broadcast channel.
    pub event_channel_capacity: usize,

    // Catalog
    /// Base URL of the content backend. `None` disables catalog lookups;
    /// clients must then send an `audioUrl` with every toggle.
    pub catalog_base_url: Option<String>,

    // WebSocket
    /// WebSocket heartbeat timeout (seconds).
    pub ws_heartbeat_timeout_secs: u64,

    /// Interval between WebSocket heartbeat checks (seconds).
    pub ws_heartbeat_check_interval_secs: u64,
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err("cache_dir must not be empty".to_string());
        }
        if self.download_timeout_secs == 0 {
            return Err("download_timeout_secs must be >= 1".to_string());
        }
        if self.http_timeout_secs == 0 {
            return Err("http_timeout_secs must be >= 1".to_string());
        }
        if self.command_channel_capacity == 0 {
            return Err("command_channel_capacity must be >= 1".to_string());
        }
        if self.event_channel_capacity == 0 {
            return Err(
                "event_channel_capacity must be >= 1 (broadcast::channel panics on 0)".to_string(),
            );
        }
        if self.ws_heartbeat_check_interval_secs == 0 {
            return Err("ws_heartbeat_check_interval_secs must be >= 1".to_string());
        }
        if self.ws_heartbeat_timeout_secs < self.ws_heartbeat_check_interval_secs {
            return Err(
                "ws_heartbeat_timeout_secs must be >= ws_heartbeat_check_interval_secs"
                    .to_string(),
            );
        }
        if let Some(ref url) = self.catalog_base_url {
            match reqwest::Url::parse(url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                _ => return Err(format!("catalog_base_url is not an http(s) URL: {}", url)),
            }
        }
        Ok(())
    }

    /// Mixer tunables derived from this configuration.
    pub fn mixer_options(&self) -> MixerOptions {
        MixerOptions {
            load_timeout: Duration::from_secs(self.download_timeout_secs),
            command_capacity: self.command_channel_capacity,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_port: 0,
            cache_dir: std::env::temp_dir().join(SERVICE_ID).join("sounds"),
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            command_channel_capacity: DEFAULT_COMMAND_CHANNEL_CAPACITY,
            event_channel_capacity: EVENT_CHANNEL_CAPACITY,
            catalog_base_url: None,
            ws_heartbeat_timeout_secs: WS_HEARTBEAT_TIMEOUT_SECS,
            ws_heartbeat_check_interval_secs: WS_HEARTBEAT_CHECK_INTERVAL_SECS,
        }
    }
}
