//! HTTP/WebSocket control API.
//!
//! Thin handlers that delegate to the mixer service and the catalog. This
//! module provides the shared state, router construction and server startup.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bootstrap::BootstrappedServices;
use crate::catalog::CatalogService;
use crate::events::{BroadcastEvent, StateBroadcaster};
use crate::lifecycle::MixerService;
use crate::protocol_constants::{PORT_RANGE_END, PORT_RANGE_START};
use crate::state::Config;

pub mod http;
pub mod response;
pub mod ws;
pub mod ws_connection;

pub use ws_connection::WsConnectionManager;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),

    /// No available ports in the specified range.
    #[error("No available ports in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },
}

/// Shared application state for the API layer.
#[derive(Clone)]
pub struct AppState {
    /// Hands out the mixer and tracks attached clients.
    pub mixer_service: Arc<MixerService>,
    /// Sound catalog used to resolve toggles by id.
    pub catalog: Arc<CatalogService>,
    /// Latest mixer snapshot.
    pub broadcaster: Arc<StateBroadcaster>,
    /// Broadcast channel sender for real-time events.
    pub broadcast_tx: broadcast::Sender<BroadcastEvent>,
    /// Manages WebSocket connections.
    pub ws_manager: Arc<WsConnectionManager>,
    /// Application configuration.
    pub config: Arc<RwLock<Config>>,
    /// Port the server actually bound (0 until listening).
    port: Arc<AtomicU16>,
}

impl AppState {
    /// Builds the API state from bootstrapped services.
    pub fn new(services: &BootstrappedServices, config: Arc<RwLock<Config>>) -> Self {
        Self {
            mixer_service: Arc::clone(&services.mixer_service),
            catalog: Arc::clone(&services.catalog),
            broadcaster: Arc::clone(&services.broadcaster),
            broadcast_tx: services.broadcast_tx.clone(),
            ws_manager: Arc::clone(&services.ws_manager),
            config,
            port: Arc::new(AtomicU16::new(0)),
        }
    }

    /// Port the server is listening on, or 0 before binding.
    pub fn port(&self) -> u16 {
        self.port.load(Ordering::SeqCst)
    }
}

async fn find_available_port(start: u16, end: u16) -> Result<(u16, TcpListener), ServerError> {
    for port in start..=end {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        if let Ok(listener) = TcpListener::bind(&addr).await {
            return Ok((port, listener));
        }
    }
    Err(ServerError::NoAvailablePort { start, end })
}

/// Binds the configured port, or the first free port in the default range.
///
/// The control API only listens on loopback.
pub async fn bind_listener(state: &AppState) -> Result<(u16, TcpListener), ServerError> {
    let preferred_port = state.config.read().preferred_port;
    let (port, listener) = if preferred_port > 0 {
        let addr = SocketAddr::from(([127, 0, 0, 1], preferred_port));
        (preferred_port, TcpListener::bind(&addr).await?)
    } else {
        find_available_port(PORT_RANGE_START, PORT_RANGE_END).await?
    };
    state.port.store(port, Ordering::SeqCst);
    Ok((port, listener))
}

/// Serves the API on `listener` until `shutdown` is cancelled.
pub async fn serve(
    state: AppState,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        state.port.store(addr.port(), Ordering::SeqCst);
        log::info!("Server listening on http://{}", addr);
    }
    let app = http::create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

/// Starts the HTTP server on the configured or auto-discovered port.
pub async fn start_server(state: AppState, shutdown: CancellationToken) -> Result<(), ServerError> {
    let (_, listener) = bind_listener(&state).await?;
    serve(state, listener, shutdown).await
}
