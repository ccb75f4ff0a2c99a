//! Soundscape Server - headless ambient sound mixer service.
//!
//! This binary hosts the mixer as a long-running background process. Clients
//! control it over the local HTTP/WebSocket API; the "relaxation sounds
//! active" notification is shown on the desktop session bus when available.

#[cfg(feature = "speaker-output")]
mod audio;
mod config;
mod notify;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::RwLock;
use soundscape_core::{bind_listener, bootstrap_services, serve, AppState, PlaybackBackend};
use tokio::signal;

use crate::config::ServerConfig;

/// Soundscape Server - Background mixer for looping relaxation sounds.
#[derive(Parser, Debug)]
#[command(name = "soundscape-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "SOUNDSCAPE_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "SOUNDSCAPE_BIND_PORT")]
    port: Option<u16>,

    /// Directory for downloaded sounds (overrides config file).
    #[arg(short = 'd', long, env = "SOUNDSCAPE_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Base URL of the sound catalog backend (overrides config file).
    #[arg(long, env = "SOUNDSCAPE_CATALOG_URL")]
    catalog_url: Option<String>,

    /// Log notification changes instead of using the desktop session bus.
    #[arg(long)]
    no_desktop_notifications: bool,
}

/// How the process was asked to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitSignal {
    /// Interactive interrupt (Ctrl+C).
    Interrupt,
    /// The host is reclaiming the process (SIGTERM).
    Reclaim,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Soundscape Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(cache_dir) = args.cache_dir {
        config.cache_dir = Some(cache_dir);
    }
    if let Some(catalog_url) = args.catalog_url {
        config.catalog_url = Some(catalog_url);
    }
    if args.no_desktop_notifications {
        config.desktop_notifications = false;
    }

    let core_config = config.to_core_config();
    log::info!(
        "Configuration: bind_port={}, cache_dir={}, catalog={}",
        core_config.preferred_port,
        core_config.cache_dir.display(),
        core_config.catalog_base_url.as_deref().unwrap_or("none")
    );

    let surface = notify::select_surface(config.desktop_notifications).await;
    let services = bootstrap_services(&core_config, playback_backend(), surface)
        .context("Failed to bootstrap services")?;

    log::info!(
        "Services bootstrapped successfully (backend: {})",
        services.backend.name()
    );

    // Build app state for the HTTP server
    let app_state = AppState::new(&services, Arc::new(RwLock::new(core_config)));
    let (port, listener) = bind_listener(&app_state)
        .await
        .context("Failed to bind control API")?;

    let shutdown = services.cancel_token.child_token();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = serve(app_state, listener, shutdown).await {
            log::error!("Server error: {}", e);
        }
    });

    log::info!("Control API started on port {}", port);

    // Wait for shutdown signal
    match shutdown_signal().await {
        ExitSignal::Reclaim => {
            log::info!("Process reclaimed, stopping playback...");
            services.reclaim().await;
        }
        ExitSignal::Interrupt => {
            log::info!("Shutdown signal received, cleaning up...");
            services.shutdown().await;
        }
    }

    // The server stops once the services' cancel token fires.
    if server_handle.await.is_err() {
        log::warn!("Server task ended abnormally");
    }

    log::info!("Shutdown complete");
    Ok(())
}

#[cfg(feature = "speaker-output")]
fn playback_backend() -> Arc<dyn PlaybackBackend> {
    Arc::new(audio::SpeakerBackend)
}

#[cfg(not(feature = "speaker-output"))]
fn playback_backend() -> Arc<dyn PlaybackBackend> {
    Arc::new(soundscape_core::HeadlessBackend)
}

/// Waits for Ctrl+C or SIGTERM and reports which one arrived.
async fn shutdown_signal() -> ExitSignal {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => ExitSignal::Interrupt,
        _ = terminate => ExitSignal::Reclaim,
    }
}
