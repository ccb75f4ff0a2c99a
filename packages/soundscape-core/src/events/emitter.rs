//! Observer and emitter abstractions.
//!
//! The mixer only knows about [`MixerObserver`]s registered on the
//! [`StateBroadcaster`](super::StateBroadcaster). Transport concerns sit behind
//! [`EventEmitter`], so services can emit events without knowing whether they
//! end up on a WebSocket, in a log, or nowhere.

use super::{CatalogEvent, MixerEvent};
use crate::mixer::MixerSnapshot;

/// Receives every mixer state transition.
///
/// Called synchronously on the thread that published the snapshot, in
/// subscription order. Implementations must not block; long work has to be
/// handed off (e.g. through a channel).
pub trait MixerObserver: Send + Sync {
    fn on_state_changed(&self, snapshot: &MixerSnapshot);
}

/// Trait for emitting domain events without knowledge of transport.
pub trait EventEmitter: Send + Sync {
    /// Emits a mixer state event.
    fn emit_mixer(&self, event: MixerEvent);

    /// Emits a catalog event.
    fn emit_catalog(&self, event: CatalogEvent);
}

/// No-op emitter for tests and embedded use.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_mixer(&self, _event: MixerEvent) {}

    fn emit_catalog(&self, _event: CatalogEvent) {}
}

/// Observer that logs every snapshot at debug level.
pub struct LoggingObserver;

impl MixerObserver for LoggingObserver {
    fn on_state_changed(&self, snapshot: &MixerSnapshot) {
        tracing::debug!(?snapshot, "mixer_state");
        if let Some(ref failure) = snapshot.last_error {
            log::warn!(
                "[Mixer] {} failed ({:?}): {}",
                failure.id,
                failure.kind,
                failure.message
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Test emitter that counts events.
    struct CountingEventEmitter {
        mixer_count: AtomicUsize,
        catalog_count: AtomicUsize,
    }

    impl EventEmitter for CountingEventEmitter {
        fn emit_mixer(&self, _event: MixerEvent) {
            self.mixer_count.fetch_add(1, Ordering::SeqCst);
        }

        fn emit_catalog(&self, _event: CatalogEvent) {
            self.catalog_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn emitter_trait_objects_dispatch() {
        let counting = Arc::new(CountingEventEmitter {
            mixer_count: AtomicUsize::new(0),
            catalog_count: AtomicUsize::new(0),
        });
        let emitters: Vec<Arc<dyn EventEmitter>> =
            vec![counting.clone(), Arc::new(NoopEventEmitter)];

        for emitter in &emitters {
            emitter.emit_mixer(MixerEvent::StateChanged {
                snapshot: MixerSnapshot::default(),
                timestamp: 0,
            });
            emitter.emit_catalog(CatalogEvent::Refreshed {
                count: 0,
                timestamp: 0,
            });
        }

        assert_eq!(counting.mixer_count.load(Ordering::SeqCst), 1);
        assert_eq!(counting.catalog_count.load(Ordering::SeqCst), 1);
    }
}
