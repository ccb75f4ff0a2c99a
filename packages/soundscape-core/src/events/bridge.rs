//! Bridge from domain events to the WebSocket broadcast channel.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::emitter::{EventEmitter, MixerObserver};
use super::{BroadcastEvent, CatalogEvent, MixerEvent};
use crate::mixer::MixerSnapshot;
use crate::utils::now_millis;

/// Forwards events to a `tokio::sync::broadcast` channel that WebSocket
/// handlers subscribe to, and optionally to an external emitter.
///
/// Registered on the [`StateBroadcaster`](super::StateBroadcaster) as a
/// [`MixerObserver`]; each snapshot becomes a [`MixerEvent::StateChanged`].
/// Sending never blocks: slow receivers lag instead.
#[derive(Clone)]
pub struct BroadcastEventBridge {
    tx: broadcast::Sender<BroadcastEvent>,
    /// Optional external emitter for host-specific delivery.
    external_emitter: Arc<RwLock<Option<Arc<dyn EventEmitter>>>>,
}

impl BroadcastEventBridge {
    /// Creates a new bridge with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self::with_sender(tx)
    }

    /// Creates a new bridge wrapping an existing broadcast sender.
    pub fn with_sender(tx: broadcast::Sender<BroadcastEvent>) -> Self {
        Self {
            tx,
            external_emitter: Arc::new(RwLock::new(None)),
        }
    }

    /// Sets an external emitter that receives a copy of every event.
    pub fn set_external_emitter(&self, emitter: Arc<dyn EventEmitter>) {
        *self.external_emitter.write() = Some(emitter);
    }

    /// Returns a new receiver for the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.tx.subscribe()
    }

    /// Returns a reference to the broadcast sender.
    pub fn sender(&self) -> &broadcast::Sender<BroadcastEvent> {
        &self.tx
    }
}

/// Generates an [`EventEmitter`] method that forwards to the external emitter
/// (if set) and then sends to the broadcast channel.
macro_rules! impl_emit {
    ($method:ident, $event_ty:ty, $variant:ident) => {
        fn $method(&self, event: $event_ty) {
            if let Some(ref emitter) = *self.external_emitter.read() {
                emitter.$method(event.clone());
            }
            if let Err(e) = self.tx.send(BroadcastEvent::$variant(event)) {
                log::trace!("[EventBridge] No broadcast receivers: {}", e);
            }
        }
    };
}

impl EventEmitter for BroadcastEventBridge {
    impl_emit!(emit_mixer, MixerEvent, Mixer);
    impl_emit!(emit_catalog, CatalogEvent, Catalog);
}

impl MixerObserver for BroadcastEventBridge {
    fn on_state_changed(&self, snapshot: &MixerSnapshot) {
        self.emit_mixer(MixerEvent::StateChanged {
            snapshot: snapshot.clone(),
            timestamp: now_millis(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::StateBroadcaster;

    #[tokio::test]
    async fn snapshots_reach_websocket_receivers() {
        let bridge = Arc::new(BroadcastEventBridge::new(16));
        let mut rx = bridge.subscribe();
        let broadcaster = StateBroadcaster::new();

        // Subscribing replays the current (empty) state.
        broadcaster.subscribe(bridge.clone());
        broadcaster.notify(MixerSnapshot {
            is_active: true,
            playing: vec!["rain".into()],
            ..Default::default()
        });

        let BroadcastEvent::Mixer(MixerEvent::StateChanged { snapshot, .. }) =
            rx.recv().await.unwrap()
        else {
            panic!("expected mixer event");
        };
        assert!(!snapshot.is_active);

        let BroadcastEvent::Mixer(MixerEvent::StateChanged { snapshot, .. }) =
            rx.recv().await.unwrap()
        else {
            panic!("expected mixer event");
        };
        assert_eq!(snapshot.playing, vec!["rain"]);
    }

    #[test]
    fn send_without_receivers_is_harmless() {
        let bridge = BroadcastEventBridge::new(4);
        bridge.emit_catalog(CatalogEvent::Refreshed {
            count: 3,
            timestamp: 0,
        });
        assert_eq!(bridge.sender().receiver_count(), 0);
    }
}
