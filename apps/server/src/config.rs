//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the control API to (0 = first free port in the default range).
    /// Override: `SOUNDSCAPE_BIND_PORT`
    pub bind_port: u16,

    /// Directory for downloaded sounds. Defaults to a folder under the
    /// system temp directory.
    /// Override: `SOUNDSCAPE_CACHE_DIR`
    pub cache_dir: Option<PathBuf>,

    /// Base URL of the content backend serving the sound catalog.
    /// Override: `SOUNDSCAPE_CATALOG_URL`
    pub catalog_url: Option<String>,

    /// Upper bound for downloading and opening one sound, in seconds.
    /// Override: `SOUNDSCAPE_DOWNLOAD_TIMEOUT`
    pub download_timeout: u64,

    /// Show the "sounds active" notification on the desktop session bus.
    /// When disabled or unavailable, notification changes are only logged.
    pub desktop_notifications: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_port: 0,
            cache_dir: None,
            catalog_url: None,
            download_timeout: soundscape_core::protocol_constants::DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            desktop_notifications: true,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_yaml(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SOUNDSCAPE_BIND_PORT") {
            if let Ok(port) = val.parse() {
                self.bind_port = port;
            }
        }

        if let Ok(val) = std::env::var("SOUNDSCAPE_DOWNLOAD_TIMEOUT") {
            if let Ok(secs) = val.parse() {
                self.download_timeout = secs;
            }
        }

        // Note: SOUNDSCAPE_CACHE_DIR and SOUNDSCAPE_CATALOG_URL are handled by
        // clap via #[arg(env = ...)] in main.rs
    }

    /// Converts to soundscape-core's Config type.
    pub fn to_core_config(&self) -> soundscape_core::Config {
        let defaults = soundscape_core::Config::default();
        soundscape_core::Config {
            preferred_port: self.bind_port,
            cache_dir: self.cache_dir.clone().unwrap_or(defaults.cache_dir.clone()),
            catalog_base_url: self.catalog_url.clone(),
            download_timeout_secs: self.download_timeout,
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_yaml_with_defaults() {
        let config = ServerConfig::from_yaml(
            "bind_port: 49600\ncatalog_url: https://content.example.com\n",
        )
        .unwrap();
        assert_eq!(config.bind_port, 49600);
        assert_eq!(
            config.catalog_url.as_deref(),
            Some("https://content.example.com")
        );
        assert!(config.cache_dir.is_none());
        assert!(config.desktop_notifications);
    }

    #[test]
    fn core_config_keeps_defaults_for_unset_fields() {
        let config = ServerConfig {
            cache_dir: Some(PathBuf::from("/var/cache/soundscape")),
            download_timeout: 45,
            ..Default::default()
        };
        let core = config.to_core_config();
        assert_eq!(core.cache_dir, PathBuf::from("/var/cache/soundscape"));
        assert_eq!(core.download_timeout_secs, 45);
        assert_eq!(core.preferred_port, 0);
        assert!(core.catalog_base_url.is_none());
        assert!(core.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_types() {
        assert!(ServerConfig::from_yaml("bind_port: not-a-port\n").is_err());
    }
}
