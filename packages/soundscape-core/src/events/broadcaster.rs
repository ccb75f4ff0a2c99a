//! Observer registry for mixer state.
//!
//! Subscribing delivers the latest snapshot immediately, so a late-joining
//! client never renders a stale "nothing playing". [`StateBroadcaster::notify`]
//! delivers synchronously to every observer in subscription order.

use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};

use super::MixerObserver;
use crate::mixer::MixerSnapshot;

/// Handle returned by [`StateBroadcaster::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct Registry {
    next_id: u64,
    observers: Vec<(ObserverId, Arc<dyn MixerObserver>)>,
    /// Last published snapshot, without its transient error.
    latest: MixerSnapshot,
}

/// Registry of [`MixerObserver`]s.
///
/// Delivery (both the initial snapshot on subscribe and every `notify`) is
/// serialized by a re-entrant lock, so observers see snapshots in publish
/// order and may subscribe or unsubscribe from inside a callback. The
/// registry lock itself is never held while an observer runs.
pub struct StateBroadcaster {
    registry: Mutex<Registry>,
    delivery: ReentrantMutex<()>,
}

impl StateBroadcaster {
    /// Creates a broadcaster whose current state is the empty mixer.
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry {
                next_id: 1,
                observers: Vec::new(),
                latest: MixerSnapshot::default(),
            }),
            delivery: ReentrantMutex::new(()),
        }
    }

    /// Registers an observer and immediately delivers the current snapshot.
    pub fn subscribe(&self, observer: Arc<dyn MixerObserver>) -> ObserverId {
        let _delivery = self.delivery.lock();
        let (id, snapshot) = {
            let mut registry = self.registry.lock();
            let id = ObserverId(registry.next_id);
            registry.next_id += 1;
            registry.observers.push((id, Arc::clone(&observer)));
            (id, registry.latest.clone())
        };
        observer.on_state_changed(&snapshot);
        id
    }

    /// Removes an observer. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut registry = self.registry.lock();
        let before = registry.observers.len();
        registry.observers.retain(|(oid, _)| *oid != id);
        registry.observers.len() != before
    }

    /// Records `snapshot` as current and delivers it to every observer.
    pub fn notify(&self, snapshot: MixerSnapshot) {
        let _delivery = self.delivery.lock();
        let observers: Vec<Arc<dyn MixerObserver>> = {
            let mut registry = self.registry.lock();
            registry.latest = snapshot.without_error();
            registry
                .observers
                .iter()
                .map(|(_, o)| Arc::clone(o))
                .collect()
        };
        for observer in observers {
            observer.on_state_changed(&snapshot);
        }
    }

    /// Returns the last published snapshot.
    pub fn current(&self) -> MixerSnapshot {
        self.registry.lock().latest.clone()
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.registry.lock().observers.len()
    }
}

impl Default for StateBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::{FailureKind, TrackFailure};

    /// Records every snapshot it receives, tagged with its name.
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<(&'static str, MixerSnapshot)>>>,
    }

    impl MixerObserver for Recorder {
        fn on_state_changed(&self, snapshot: &MixerSnapshot) {
            self.log.lock().push((self.name, snapshot.clone()));
        }
    }

    fn active(ids: &[&str]) -> MixerSnapshot {
        MixerSnapshot {
            is_active: !ids.is_empty(),
            is_paused: false,
            playing: ids.iter().map(|s| s.to_string()).collect(),
            loading: vec![],
            last_error: None,
        }
    }

    #[test]
    fn subscribe_delivers_current_snapshot_immediately() {
        let broadcaster = StateBroadcaster::new();
        broadcaster.notify(active(&["rain", "wind", "fire"]));

        let log = Arc::new(Mutex::new(Vec::new()));
        broadcaster.subscribe(Arc::new(Recorder {
            name: "late",
            log: log.clone(),
        }));

        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert!(log[0].1.is_active);
        assert!(!log[0].1.is_paused);
        assert_eq!(log[0].1.playing.len(), 3);
    }

    #[test]
    fn notify_runs_in_subscription_order() {
        let broadcaster = StateBroadcaster::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            broadcaster.subscribe(Arc::new(Recorder {
                name,
                log: log.clone(),
            }));
        }
        log.lock().clear();

        broadcaster.notify(active(&["rain"]));

        let names: Vec<_> = log.lock().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn unsubscribed_observer_stops_receiving() {
        let broadcaster = StateBroadcaster::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = broadcaster.subscribe(Arc::new(Recorder {
            name: "a",
            log: log.clone(),
        }));

        assert!(broadcaster.unsubscribe(id));
        assert!(!broadcaster.unsubscribe(id));
        broadcaster.notify(active(&["rain"]));

        assert_eq!(log.lock().len(), 1);
        assert_eq!(broadcaster.observer_count(), 0);
    }

    #[test]
    fn transient_error_is_not_replayed_to_late_subscribers() {
        let broadcaster = StateBroadcaster::new();
        broadcaster.notify(MixerSnapshot {
            last_error: Some(TrackFailure {
                id: "rain".into(),
                kind: FailureKind::DownloadFailed,
                message: "HTTP 404".into(),
            }),
            ..Default::default()
        });

        assert!(broadcaster.current().last_error.is_none());
    }

    /// Observer that subscribes another observer from inside its callback.
    struct Reentrant {
        broadcaster: Arc<StateBroadcaster>,
        log: Arc<Mutex<Vec<(&'static str, MixerSnapshot)>>>,
        done: Mutex<bool>,
    }

    impl MixerObserver for Reentrant {
        fn on_state_changed(&self, _snapshot: &MixerSnapshot) {
            let mut done = self.done.lock();
            if !*done {
                *done = true;
                self.broadcaster.subscribe(Arc::new(Recorder {
                    name: "nested",
                    log: self.log.clone(),
                }));
            }
        }
    }

    #[test]
    fn observers_may_subscribe_from_callbacks() {
        let broadcaster = Arc::new(StateBroadcaster::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        broadcaster.subscribe(Arc::new(Reentrant {
            broadcaster: broadcaster.clone(),
            log: log.clone(),
            done: Mutex::new(false),
        }));

        assert_eq!(broadcaster.observer_count(), 2);
        assert_eq!(log.lock().len(), 1);
    }
}
