//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where all
//! services are instantiated and wired together. Hosts supply the two
//! platform-specific pieces (the playback backend and the notification
//! surface); everything else is built here.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::api::WsConnectionManager;
use crate::cache::CacheStore;
use crate::catalog::{CatalogClient, CatalogService, HttpCatalogClient};
use crate::error::{SoundscapeError, SoundscapeResult};
use crate::events::{
    BroadcastEvent, BroadcastEventBridge, EventEmitter, LoggingObserver, StateBroadcaster,
};
use crate::lifecycle::{MixerService, ServiceLifecycle};
use crate::mixer::MixerDeps;
use crate::notification::{NotificationPresenter, NotificationSurface};
use crate::player::PlaybackBackend;
use crate::protocol_constants::APP_NAME;
use crate::runtime::TokioSpawner;
use crate::state::Config;

/// How long shutdown waits for the notification to be dismissed.
const PRESENTER_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Download-once audio cache.
    pub cache: Arc<CacheStore>,
    /// Opens cached files for playback.
    pub backend: Arc<dyn PlaybackBackend>,
    /// Fans mixer snapshots out to observers.
    pub broadcaster: Arc<StateBroadcaster>,
    /// Broadcast channel sender for real-time events.
    pub broadcast_tx: broadcast::Sender<BroadcastEvent>,
    /// Event bridge for emitting events to WebSocket and optional external consumers.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Keeps the "sounds active" notification in sync with the mixer.
    pub presenter: Arc<NotificationPresenter>,
    /// Cached sound catalog.
    pub catalog: Arc<CatalogService>,
    /// Owns the mixer across client attachments.
    pub mixer_service: Arc<MixerService>,
    /// Manages WebSocket connections.
    pub ws_manager: Arc<WsConnectionManager>,
    /// Shared HTTP client for connection pooling.
    http_client: Client,
    /// Task spawner for background operations.
    pub spawner: TokioSpawner,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Returns the shared HTTP client.
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Initiates graceful shutdown of all services.
    ///
    /// Stops every sound, disconnects WebSocket clients, cancels background
    /// tasks and waits briefly for the notification to be removed.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        let connections_closed = self.ws_manager.close_all();
        if connections_closed > 0 {
            log::info!(
                "[Bootstrap] Closed {} WebSocket connection(s)",
                connections_closed
            );
        }

        let stopped = self.mixer_service.shutdown().await;
        log::info!("[Bootstrap] Stopped {} sound(s)", stopped);

        self.cancel_token.cancel();
        if tokio::time::timeout(PRESENTER_SHUTDOWN_GRACE, self.presenter.closed())
            .await
            .is_err()
        {
            log::warn!("[Bootstrap] Notification presenter did not stop in time");
        }

        log::info!("[Bootstrap] Shutdown complete");
    }

    /// Handles the host reclaiming the process: stops all playback, then
    /// shuts everything down.
    pub async fn reclaim(&self) {
        self.mixer_service.on_process_reclaimed().await;
        self.shutdown().await;
    }
}

/// Creates the shared HTTP client used for downloads and catalog requests.
///
/// `timeout_secs` bounds connecting and each read, not the whole response:
/// a large sound on a slow link keeps streaming as long as bytes arrive. The
/// mixer's load timeout caps a complete download.
fn create_http_client(timeout_secs: u64) -> SoundscapeResult<Client> {
    let timeout = Duration::from_secs(timeout_secs);
    Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .user_agent(format!("{}/{}", APP_NAME, env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SoundscapeError::Internal(format!("Failed to create HTTP client: {}", e)))
}

/// Bootstraps all application services with their dependencies.
///
/// Services are created in dependency order:
///
/// 1. Shared infrastructure (HTTP client, broadcast channel, cancellation token)
/// 2. Cache store (depends on HTTP client); stale partial files are purged
/// 3. State broadcaster and its observers (log, event bridge, notification)
/// 4. Catalog service (depends on HTTP client, event bridge)
/// 5. Mixer service (depends on cache, backend, broadcaster)
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the cache directory
/// cannot be prepared.
pub fn bootstrap_services(
    config: &Config,
    backend: Arc<dyn PlaybackBackend>,
    surface: Arc<dyn NotificationSurface>,
) -> SoundscapeResult<BootstrappedServices> {
    config.validate().map_err(SoundscapeError::Configuration)?;

    let spawner = TokioSpawner::current();
    let http_client = create_http_client(config.http_timeout_secs)?;
    let cancel_token = CancellationToken::new();

    let cache = Arc::new(CacheStore::new(&config.cache_dir, http_client.clone())?);
    cache.purge_partials()?;
    log::info!("[Bootstrap] Audio cache at {}", cache.dir().display());

    // Create broadcast channel for real-time events to WebSocket clients
    let (broadcast_tx, _) = broadcast::channel::<BroadcastEvent>(config.event_channel_capacity);
    let event_bridge = Arc::new(BroadcastEventBridge::with_sender(broadcast_tx.clone()));

    let presenter = NotificationPresenter::start(surface, &spawner, cancel_token.child_token());

    let broadcaster = Arc::new(StateBroadcaster::new());
    broadcaster.subscribe(Arc::new(LoggingObserver));
    broadcaster.subscribe(event_bridge.clone());
    broadcaster.subscribe(presenter.clone());

    let catalog_client = config.catalog_base_url.as_ref().map(|base| {
        log::info!("[Bootstrap] Catalog at {}", base);
        Arc::new(HttpCatalogClient::new(http_client.clone(), base.clone())) as Arc<dyn CatalogClient>
    });
    if catalog_client.is_none() {
        log::info!("[Bootstrap] No catalog configured; toggles must carry an audio URL");
    }
    let catalog = Arc::new(CatalogService::new(
        catalog_client,
        Arc::clone(&event_bridge) as Arc<dyn EventEmitter>,
    ));

    let mixer_service = MixerService::new(
        MixerDeps {
            cache: Arc::clone(&cache),
            backend: Arc::clone(&backend),
            broadcaster: Arc::clone(&broadcaster),
            spawner: spawner.clone(),
            options: config.mixer_options(),
        },
        cancel_token.child_token(),
    );

    Ok(BootstrappedServices {
        cache,
        backend,
        broadcaster,
        broadcast_tx,
        event_bridge,
        presenter,
        catalog,
        mixer_service,
        ws_manager: Arc::new(WsConnectionManager::new()),
        http_client,
        spawner,
        cancel_token,
    })
}
