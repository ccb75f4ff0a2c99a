//! Event system for mixer state propagation.
//!
//! This module provides:
//! - [`StateBroadcaster`], the observer registry the mixer notifies after every
//!   state change
//! - [`MixerObserver`] and its stock implementations
//! - [`EventEmitter`] / [`BroadcastEventBridge`] for WebSocket transport

mod bridge;
mod broadcaster;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use broadcaster::{ObserverId, StateBroadcaster};
pub use emitter::{EventEmitter, LoggingObserver, MixerObserver, NoopEventEmitter};

use serde::Serialize;

use crate::mixer::MixerSnapshot;

/// Events broadcast to WebSocket clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// Mixer state transitions.
    Mixer(MixerEvent),

    /// Catalog changes.
    Catalog(CatalogEvent),
}

/// Events related to mixer state changes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MixerEvent {
    /// The mixer published a new snapshot.
    StateChanged {
        #[serde(flatten)]
        snapshot: MixerSnapshot,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

/// Events related to the sound catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CatalogEvent {
    /// The catalog was fetched from the content backend.
    Refreshed {
        /// Number of entries in the catalog.
        count: usize,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

impl From<MixerEvent> for BroadcastEvent {
    fn from(event: MixerEvent) -> Self {
        BroadcastEvent::Mixer(event)
    }
}

impl From<CatalogEvent> for BroadcastEvent {
    fn from(event: CatalogEvent) -> Self {
        BroadcastEvent::Catalog(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_changed_wire_format() {
        let event = BroadcastEvent::from(MixerEvent::StateChanged {
            snapshot: MixerSnapshot {
                is_active: true,
                is_paused: true,
                playing: vec!["rain".into()],
                loading: vec![],
                last_error: None,
            },
            timestamp: 5,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "category": "mixer",
                "type": "stateChanged",
                "isActive": true,
                "isPaused": true,
                "playing": ["rain"],
                "loading": [],
                "timestamp": 5,
            })
        );
    }

    #[test]
    fn catalog_refreshed_wire_format() {
        let event = BroadcastEvent::from(CatalogEvent::Refreshed {
            count: 12,
            timestamp: 1,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["category"], "catalog");
        assert_eq!(json["type"], "refreshed");
        assert_eq!(json["count"], 12);
    }
}
