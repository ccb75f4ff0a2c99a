//! The mixer actor: sole owner of the active-track map and the paused flag.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{FailureKind, MixerCommand, MixerDeps, MixerSnapshot, ToggleOutcome, TrackFailure};
use crate::cache::CacheStore;
use crate::catalog::TrackDescriptor;
use crate::events::StateBroadcaster;
use crate::player::{PlaybackBackend, TrackPlayer};
use crate::runtime::{TaskSpawner, TokioSpawner};

/// One entry of the active-track map.
enum Slot {
    /// Download/open in flight. `generation` identifies the loader so a
    /// completion for a superseded load can be recognized.
    Loading {
        generation: u64,
        cancel: CancellationToken,
    },
    Playing {
        player: Box<dyn TrackPlayer>,
    },
}

/// Completion message sent by a loader task back to the actor.
struct LoadFinished {
    id: String,
    generation: u64,
    result: Result<Box<dyn TrackPlayer>, TrackFailure>,
}

pub(super) struct MixerActor {
    cache: Arc<CacheStore>,
    backend: Arc<dyn PlaybackBackend>,
    broadcaster: Arc<StateBroadcaster>,
    spawner: TokioSpawner,
    load_timeout: Duration,
    /// Ordered so snapshots list ids deterministically.
    slots: BTreeMap<String, Slot>,
    paused: bool,
    next_generation: u64,
    load_tx: mpsc::UnboundedSender<LoadFinished>,
    load_rx: Option<mpsc::UnboundedReceiver<LoadFinished>>,
    cancel: CancellationToken,
}

impl MixerActor {
    pub(super) fn new(deps: &MixerDeps, cancel: CancellationToken) -> Self {
        let (load_tx, load_rx) = mpsc::unbounded_channel();
        Self {
            cache: Arc::clone(&deps.cache),
            backend: Arc::clone(&deps.backend),
            broadcaster: Arc::clone(&deps.broadcaster),
            spawner: deps.spawner.clone(),
            load_timeout: deps.options.load_timeout,
            slots: BTreeMap::new(),
            paused: false,
            next_generation: 1,
            load_tx,
            load_rx: Some(load_rx),
            cancel,
        }
    }

    pub(super) async fn run(mut self, mut commands: mpsc::Receiver<MixerCommand>) {
        let Some(mut loads) = self.load_rx.take() else {
            return;
        };
        let cancel = self.cancel.clone();
        log::info!("[Mixer] Started (backend: {})", self.backend.name());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("[Mixer] Shutdown requested");
                    break;
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        log::info!("[Mixer] All handles dropped");
                        break;
                    }
                },
                Some(done) = loads.recv() => self.handle_load_finished(done),
            }
        }

        let released = self.stop_all();
        log::info!("[Mixer] Stopped ({} track(s) released)", released);
    }

    fn handle_command(&mut self, command: MixerCommand) {
        match command {
            MixerCommand::Toggle { track, reply } => {
                let _ = reply.send(self.toggle(track));
            }
            MixerCommand::PauseAll { reply } => {
                let _ = reply.send(self.pause_all());
            }
            MixerCommand::ResumeAll { reply } => {
                let _ = reply.send(self.resume_all());
            }
            MixerCommand::StopAll { reply } => {
                let _ = reply.send(self.stop_all());
            }
            MixerCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot(None));
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    fn toggle(&mut self, track: TrackDescriptor) -> ToggleOutcome {
        if self.paused {
            self.resume_all();
        }

        match self.slots.get(&track.id) {
            Some(Slot::Loading { .. }) => {
                log::debug!("[Mixer] {} is already loading, ignoring toggle", track.id);
                return ToggleOutcome::AlreadyLoading;
            }
            Some(Slot::Playing { .. }) => {
                if let Some(slot) = self.slots.remove(&track.id) {
                    release(slot);
                }
                self.after_removal();
                log::info!("[Mixer] Stopped {}", track.id);
                self.publish(None);
                return ToggleOutcome::Stopped;
            }
            None => {}
        }

        // Cached tracks still open off the actor, under the load timeout.
        let cached = self.cache.lookup(&track.id, &track.audio_url).is_some();
        self.begin_load(track);
        self.publish(None);
        if cached {
            ToggleOutcome::Started
        } else {
            ToggleOutcome::Loading
        }
    }

    fn pause_all(&mut self) -> bool {
        if self.slots.is_empty() || self.paused {
            return false;
        }
        for slot in self.slots.values_mut() {
            if let Slot::Playing { player } = slot {
                player.pause();
            }
        }
        self.paused = true;
        log::info!("[Mixer] Paused {} track(s)", self.slots.len());
        self.publish(None);
        true
    }

    fn resume_all(&mut self) -> bool {
        if self.slots.is_empty() || !self.paused {
            return false;
        }
        for slot in self.slots.values_mut() {
            if let Slot::Playing { player } = slot {
                player.resume();
            }
        }
        self.paused = false;
        log::info!("[Mixer] Resumed {} track(s)", self.slots.len());
        self.publish(None);
        true
    }

    fn stop_all(&mut self) -> usize {
        let released = self.slots.len();
        for (_, slot) in std::mem::take(&mut self.slots) {
            release(slot);
        }
        self.paused = false;
        if released > 0 {
            log::info!("[Mixer] Stopped all ({} track(s))", released);
        }
        self.publish(None);
        released
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Loading
    // ─────────────────────────────────────────────────────────────────────────

    fn begin_load(&mut self, track: TrackDescriptor) {
        let generation = self.next_generation;
        self.next_generation += 1;
        let cancel = self.cancel.child_token();
        self.slots.insert(
            track.id.clone(),
            Slot::Loading {
                generation,
                cancel: cancel.clone(),
            },
        );
        log::info!("[Mixer] Loading {} from {}", track.id, track.audio_url);

        let cache = Arc::clone(&self.cache);
        let backend = Arc::clone(&self.backend);
        let load_tx = self.load_tx.clone();
        let timeout = self.load_timeout;

        self.spawner.spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    log::debug!("[Mixer] Load of {} cancelled", track.id);
                    return;
                }
                outcome = tokio::time::timeout(timeout, load_track(&cache, backend, &track)) => {
                    outcome.unwrap_or_else(|_| {
                        Err(TrackFailure {
                            id: track.id.clone(),
                            kind: FailureKind::TimedOut,
                            message: format!("load did not finish within {}s", timeout.as_secs_f32()),
                        })
                    })
                }
            };
            let _ = load_tx.send(LoadFinished {
                id: track.id,
                generation,
                result,
            });
        });
    }

    fn handle_load_finished(&mut self, done: LoadFinished) {
        let current = matches!(
            self.slots.get(&done.id),
            Some(Slot::Loading { generation, .. }) if *generation == done.generation
        );
        if !current {
            log::debug!("[Mixer] Discarding stale load of {}", done.id);
            if let Ok(player) = done.result {
                player.stop();
            }
            return;
        }

        match done.result {
            Ok(mut player) => {
                player.start();
                if self.paused {
                    player.pause();
                }
                log::info!(
                    "[Mixer] Playing {}{}",
                    done.id,
                    if self.paused { " (paused)" } else { "" }
                );
                self.slots.insert(done.id, Slot::Playing { player });
                self.publish(None);
            }
            Err(failure) => {
                log::warn!("[Mixer] Failed to load {}: {}", done.id, failure.message);
                self.slots.remove(&done.id);
                self.after_removal();
                self.publish(Some(failure));
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // State Publication
    // ─────────────────────────────────────────────────────────────────────────

    /// Clears the paused flag once nothing is left to be paused.
    fn after_removal(&mut self) {
        if self.slots.is_empty() {
            self.paused = false;
        }
    }

    fn snapshot(&self, last_error: Option<TrackFailure>) -> MixerSnapshot {
        let mut playing = Vec::new();
        let mut loading = Vec::new();
        for (id, slot) in &self.slots {
            match slot {
                Slot::Playing { .. } => playing.push(id.clone()),
                Slot::Loading { .. } => loading.push(id.clone()),
            }
        }
        MixerSnapshot {
            is_active: !self.slots.is_empty(),
            is_paused: self.paused,
            playing,
            loading,
            last_error,
        }
    }

    fn publish(&self, last_error: Option<TrackFailure>) {
        self.broadcaster.notify(self.snapshot(last_error));
    }
}

/// Stops a player or cancels a load.
fn release(slot: Slot) {
    match slot {
        Slot::Loading { cancel, .. } => cancel.cancel(),
        Slot::Playing { player } => player.stop(),
    }
}

/// Downloads (if needed) and opens a track. Runs outside the actor.
///
/// An unplayable download is evicted so the next toggle fetches it again.
async fn load_track(
    cache: &CacheStore,
    backend: Arc<dyn PlaybackBackend>,
    track: &TrackDescriptor,
) -> Result<Box<dyn TrackPlayer>, TrackFailure> {
    let failure = |kind, message: String| TrackFailure {
        id: track.id.clone(),
        kind,
        message,
    };

    let path = cache
        .ensure(&track.id, &track.audio_url)
        .await
        .map_err(|e| failure(FailureKind::DownloadFailed, e.to_string()))?;

    let opened = tokio::task::spawn_blocking(move || backend.open(&path)).await;

    match opened {
        Ok(Ok(player)) => Ok(player),
        Ok(Err(e)) => {
            if let Err(evict_err) = cache.evict(&track.id, &track.audio_url).await {
                log::warn!("[Mixer] Failed to evict {}: {}", track.id, evict_err);
            }
            Err(failure(FailureKind::PlaybackOpenFailed, e.to_string()))
        }
        Err(join_err) => Err(failure(
            FailureKind::PlaybackOpenFailed,
            format!("decoder task failed: {}", join_err),
        )),
    }
}
