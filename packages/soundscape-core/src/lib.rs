//! Soundscape Core - ambient sound mixer service.
//!
//! This crate provides the core of Soundscape, a background service that
//! downloads relaxation sounds once, loops any combination of them at the same
//! time and keeps a persistent "sounds active" notification in sync with what
//! is playing. It is designed to be embedded by the standalone server and by
//! any other host that can supply a speaker backend.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cache`]: Download-once audio cache with atomic file placement
//! - [`player`]: Track players and the backends that open cached files
//! - [`mixer`]: The mixer actor (toggle, pause, resume, stop)
//! - [`events`]: State broadcasting and real-time client events
//! - [`notification`]: Foreground notification presenter
//! - [`lifecycle`]: Client attach/detach and process reclaim supervision
//! - [`catalog`]: Remote sound catalog lookup
//! - [`api`]: HTTP/WebSocket control API
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! - [`TaskSpawner`](runtime::TaskSpawner): Spawning background tasks
//! - [`PlaybackBackend`](player::PlaybackBackend): Opening cached files for playback
//! - [`NotificationSurface`](notification::NotificationSurface): Showing the notification
//! - [`MixerObserver`](events::MixerObserver): Receiving mixer snapshots
//! - [`ServiceLifecycle`](lifecycle::ServiceLifecycle): Host lifecycle hooks
//!
//! Each trait has a default implementation suitable for headless use.

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod cache;
pub mod catalog;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod mixer;
pub mod notification;
pub mod player;
pub mod protocol_constants;
pub mod runtime;
pub mod state;
pub mod utils;

#[cfg(test)]
mod test_fixtures;

// Re-export commonly used types at the crate root
pub use error::{ErrorCode, SoundscapeError, SoundscapeResult};
pub use events::{
    BroadcastEvent, BroadcastEventBridge, CatalogEvent, EventEmitter, MixerEvent, MixerObserver,
    StateBroadcaster,
};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use state::Config;
pub use utils::{now_millis, validate_track_request, TrackValidationError};

// Re-export domain types
pub use cache::{CacheError, CacheStore};
pub use catalog::{CatalogEntry, CatalogService, TrackDescriptor};
pub use lifecycle::{MixerBinding, MixerService, ServiceLifecycle};
pub use mixer::{FailureKind, MixerHandle, MixerSnapshot, ToggleOutcome, TrackFailure};
pub use notification::{
    LoggingNotificationSurface, NoopNotificationSurface, NotificationContent, NotificationError,
    NotificationSurface,
};
pub use player::{HeadlessBackend, PlaybackBackend, PlayerError, PlayerState, TrackPlayer};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, BootstrappedServices};

// Re-export API types
pub use api::{bind_listener, serve, start_server, AppState, ServerError, WsConnectionManager};
