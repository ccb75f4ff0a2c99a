//! Track players and the backends that open them.
//!
//! A [`PlaybackBackend`] turns a cached file into a [`TrackPlayer`]: one looping
//! audio stream at full volume that can be started, paused, resumed and
//! finally stopped. `stop` consumes the player, so a stopped handle cannot be
//! reused.
//!
//! The core ships [`HeadlessBackend`], which validates files with a real
//! decoder but has no output device. Hosts with speakers plug in their own
//! backend through the trait.

mod headless;

pub use headless::{probe_file, HeadlessBackend, HeadlessPlayer, TrackInfo};

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::error::ErrorCode;

/// Errors raised when opening a cached file for playback.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The decoder rejected the file (unknown container, corrupt data).
    #[error("cannot decode {path}: {reason}")]
    Decode { path: String, reason: String },

    /// The container holds no decodable audio track.
    #[error("no playable audio track in {0}")]
    NoTrack(String),

    /// The audio output device is unavailable.
    #[error("audio output unavailable: {0}")]
    Output(String),
}

impl ErrorCode for PlayerError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "player_io_error",
            Self::Decode { .. } => "player_decode_failed",
            Self::NoTrack(_) => "player_no_track",
            Self::Output(_) => "player_output_unavailable",
        }
    }
}

/// Convenient Result alias for player operations.
pub type PlayerResult<T> = Result<T, PlayerError>;

/// Run state of an open player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerState {
    /// Opened but never started.
    Idle,
    /// Producing audio (looping).
    Running,
    /// Paused; `resume` continues from the same position.
    Paused,
}

/// One looping audio stream.
///
/// Control calls are fast and non-blocking; implementations that drive a
/// device hand work off to their own thread.
pub trait TrackPlayer: Send {
    /// Starts looping playback at full volume.
    fn start(&mut self);

    /// Pauses playback. No-op unless running.
    fn pause(&mut self);

    /// Resumes playback. No-op unless paused.
    fn resume(&mut self);

    /// Stops playback and releases the underlying audio resource.
    fn stop(self: Box<Self>);

    /// Current run state.
    fn state(&self) -> PlayerState;
}

/// Opens cached files as [`TrackPlayer`]s.
///
/// `open` may block on file I/O and decoder setup; the mixer calls it from
/// the blocking pool.
pub trait PlaybackBackend: Send + Sync {
    /// Opens `path` for looping playback.
    ///
    /// # Errors
    ///
    /// Returns a [`PlayerError`] for unreadable or undecodable files instead
    /// of panicking.
    fn open(&self, path: &Path) -> PlayerResult<Box<dyn TrackPlayer>>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}
