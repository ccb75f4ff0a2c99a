//! WebSocket connection tracking.
//!
//! - `WsConnectionManager`: registry of open control connections
//! - `ConnectionGuard`: RAII handle that unregisters a connection on drop

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

/// Per-connection bookkeeping.
struct ConnectionInfo {
    connected_at: Instant,
}

/// Registry of open WebSocket connections with a force-close switch.
///
/// Each connection gets a child of a shared cancellation token; cancelling
/// the parent closes every connection at once.
pub struct WsConnectionManager {
    connections: DashMap<u64, ConnectionInfo>,
    next_id: AtomicU64,
    /// Replaced with a fresh token after each `close_all`.
    global_cancel: RwLock<CancellationToken>,
}

impl WsConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            global_cancel: RwLock::new(CancellationToken::new()),
        }
    }

    /// Registers a connection. Dropping the guard unregisters it.
    pub fn register(self: &Arc<Self>) -> ConnectionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel_token = self.global_cancel.read().child_token();
        self.connections.insert(
            id,
            ConnectionInfo {
                connected_at: Instant::now(),
            },
        );
        log::info!(
            "[WS] Client ws-{} connected ({} open)",
            id,
            self.connections.len()
        );
        ConnectionGuard {
            id,
            manager: Arc::clone(self),
            cancel_token,
        }
    }

    fn unregister(&self, id: u64) {
        if let Some((_, info)) = self.connections.remove(&id) {
            log::info!(
                "[WS] Client ws-{} disconnected after {:?} ({} open)",
                id,
                info.connected_at.elapsed(),
                self.connections.len()
            );
        }
    }

    /// Number of open connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Signals every open connection to close. New connections are still
    /// accepted afterwards. Returns how many connections were signalled.
    pub fn close_all(&self) -> usize {
        let count = self.connections.len();
        if count > 0 {
            log::info!("[WS] Closing {} connection(s)", count);
            let mut token = self.global_cancel.write();
            token.cancel();
            *token = CancellationToken::new();
        }
        count
    }
}

impl Default for WsConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a connection registered for as long as it lives.
pub struct ConnectionGuard {
    id: u64,
    manager: Arc<WsConnectionManager>,
    cancel_token: CancellationToken,
}

impl ConnectionGuard {
    /// Display id, e.g. `ws-3`.
    pub fn id(&self) -> String {
        format!("ws-{}", self.id)
    }

    /// Cancelled when [`WsConnectionManager::close_all`] is called.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.manager.unregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_register_and_unregister() {
        let manager = Arc::new(WsConnectionManager::new());
        let first = manager.register();
        let second = manager.register();
        assert_eq!(manager.connection_count(), 2);
        assert_ne!(first.id(), second.id());

        drop(first);
        assert_eq!(manager.connection_count(), 1);
        drop(second);
        assert_eq!(manager.connection_count(), 0);
    }

    #[test]
    fn close_all_cancels_existing_but_not_new_connections() {
        let manager = Arc::new(WsConnectionManager::new());
        let old = manager.register();

        assert_eq!(manager.close_all(), 1);
        assert!(old.cancel_token().is_cancelled());

        let new = manager.register();
        assert!(!new.cancel_token().is_cancelled());
    }
}
