//! The mixer: any number of looping tracks with global pause/resume/stop.
//!
//! All state (the active-track map and the paused flag) is owned by a single
//! actor task. [`MixerHandle`] is a cheap, cloneable front end that sends
//! commands over a channel and awaits the actor's reply, so callers on any
//! thread get linearized operations without sharing locks.
//!
//! Per track id the state machine is:
//!
//! ```text
//! Absent ──toggle──▶ Loading ──load ok──▶ Playing ⇄ Paused (global)
//!    ▲                  │                    │
//!    └── fail/timeout ──┘◀────── toggle / stop_all ─┘
//! ```
//!
//! Cached tracks pass through `Loading` too: the decoder is opened on the
//! blocking pool, never on the actor. A load that completes while the mixer is
//! paused starts already paused.

mod actor;
mod snapshot;

pub use snapshot::{FailureKind, MixerSnapshot, TrackFailure};

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::cache::CacheStore;
use crate::catalog::TrackDescriptor;
use crate::error::ErrorCode;
use crate::events::StateBroadcaster;
use crate::player::PlaybackBackend;
use crate::protocol_constants::{DEFAULT_COMMAND_CHANNEL_CAPACITY, DEFAULT_DOWNLOAD_TIMEOUT_SECS};
use crate::runtime::{TaskSpawner, TokioSpawner};

use actor::MixerActor;

/// Errors returned by [`MixerHandle`] operations.
#[derive(Debug, Error)]
pub enum MixerError {
    /// The actor has shut down; obtain a fresh handle from the supervisor.
    #[error("mixer is not running")]
    Closed,
}

impl ErrorCode for MixerError {
    fn code(&self) -> &'static str {
        match self {
            Self::Closed => "mixer_closed",
        }
    }
}

/// Convenient Result alias for mixer operations.
pub type MixerResult<T> = Result<T, MixerError>;

/// What a `toggle` request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ToggleOutcome {
    /// The track was cached; it is opening and needs no download.
    Started,
    /// A download was started; the track is loading.
    Loading,
    /// The track was already loading; the request was ignored.
    AlreadyLoading,
    /// The track was playing and has been stopped.
    Stopped,
}

/// Tunables for a mixer instance.
#[derive(Debug, Clone)]
pub struct MixerOptions {
    /// Upper bound for one load (download plus decoder open).
    pub load_timeout: Duration,
    /// Capacity of the command channel.
    pub command_capacity: usize,
}

impl Default for MixerOptions {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            command_capacity: DEFAULT_COMMAND_CHANNEL_CAPACITY,
        }
    }
}

/// Requests processed by the actor, each carrying its reply channel.
pub(crate) enum MixerCommand {
    Toggle {
        track: TrackDescriptor,
        reply: oneshot::Sender<ToggleOutcome>,
    },
    PauseAll {
        reply: oneshot::Sender<bool>,
    },
    ResumeAll {
        reply: oneshot::Sender<bool>,
    },
    StopAll {
        reply: oneshot::Sender<usize>,
    },
    Snapshot {
        reply: oneshot::Sender<MixerSnapshot>,
    },
}

/// Cloneable handle to a running mixer.
#[derive(Clone)]
pub struct MixerHandle {
    tx: mpsc::Sender<MixerCommand>,
    cancel: CancellationToken,
}

impl MixerHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> MixerCommand,
    ) -> MixerResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| MixerError::Closed)?;
        rx.await.map_err(|_| MixerError::Closed)
    }

    /// Starts the track if absent, stops it if playing, ignores it if loading.
    ///
    /// If the mixer is paused, everything is resumed first. Download and open
    /// failures are not returned here; they surface as `last_error` on the
    /// published snapshot.
    pub async fn toggle(&self, track: TrackDescriptor) -> MixerResult<ToggleOutcome> {
        self.request(|reply| MixerCommand::Toggle { track, reply })
            .await
    }

    /// Pauses every playing track. Returns false (and publishes nothing) if
    /// the mixer is empty or already paused.
    pub async fn pause_all(&self) -> MixerResult<bool> {
        self.request(|reply| MixerCommand::PauseAll { reply }).await
    }

    /// Resumes every paused track. Returns false (and publishes nothing) if
    /// the mixer is empty or not paused.
    pub async fn resume_all(&self) -> MixerResult<bool> {
        self.request(|reply| MixerCommand::ResumeAll { reply }).await
    }

    /// Stops and releases every track, cancelling in-flight loads. Always
    /// publishes. Returns the number of tracks released.
    pub async fn stop_all(&self) -> MixerResult<usize> {
        self.request(|reply| MixerCommand::StopAll { reply }).await
    }

    /// Returns the current state.
    pub async fn snapshot(&self) -> MixerResult<MixerSnapshot> {
        self.request(|reply| MixerCommand::Snapshot { reply }).await
    }

    /// True if any track is loading or playing.
    pub async fn is_active(&self) -> MixerResult<bool> {
        Ok(self.snapshot().await?.is_active)
    }

    /// True if the mixer holds tracks and they are globally paused.
    pub async fn is_paused(&self) -> MixerResult<bool> {
        Ok(self.snapshot().await?.is_paused)
    }

    /// Ids of every loading or playing track.
    pub async fn active_ids(&self) -> MixerResult<BTreeSet<String>> {
        Ok(self.snapshot().await?.active_ids())
    }

    /// Returns true once the actor has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Asks the actor to stop every track and exit.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Dependencies shared by every mixer instance the supervisor creates.
#[derive(Clone)]
pub struct MixerDeps {
    pub cache: Arc<CacheStore>,
    pub backend: Arc<dyn PlaybackBackend>,
    pub broadcaster: Arc<StateBroadcaster>,
    pub spawner: TokioSpawner,
    pub options: MixerOptions,
}

/// Spawns a mixer actor and returns its handle.
///
/// The actor exits (stopping everything) when `cancel` fires or every handle
/// has been dropped.
pub fn spawn_mixer(deps: &MixerDeps, cancel: CancellationToken) -> MixerHandle {
    let (tx, rx) = mpsc::channel(deps.options.command_capacity.max(1));
    let actor = MixerActor::new(deps, cancel.clone());
    deps.spawner.spawn(actor.run(rx));
    MixerHandle { tx, cancel }
}
