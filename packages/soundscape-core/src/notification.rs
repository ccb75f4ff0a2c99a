//! Persistent "sounds active" notification.
//!
//! [`NotificationPresenter`] is registered on the state broadcaster. It keeps
//! the host's [`NotificationSurface`] showing a notification while the mixer is
//! active and removes it when the mixer empties. Surface calls may be slow
//! (D-Bus round-trips), so the observer only stores the latest snapshot in a
//! watch channel; a background task does the actual calls and collapses bursts
//! of updates into one.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::ErrorCode;
use crate::events::MixerObserver;
use crate::mixer::MixerSnapshot;
use crate::protocol_constants::NOTIFICATION_TITLE;
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::utils::count_noun;

// ─────────────────────────────────────────────────────────────────────────────
// Content
// ─────────────────────────────────────────────────────────────────────────────

/// Title and body of the notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

impl NotificationContent {
    /// Content for `snapshot`, or `None` when nothing is active.
    pub fn for_snapshot(snapshot: &MixerSnapshot) -> Option<Self> {
        if !snapshot.is_active {
            return None;
        }
        let playing = snapshot.playing.len();
        let loading = snapshot.loading.len();

        let body = if snapshot.is_paused {
            if playing > 0 {
                format!("{} paused", count_noun(playing, "sound", "sounds"))
            } else {
                "Paused".to_string()
            }
        } else if playing > 0 && loading > 0 {
            format!(
                "{} playing, {} loading",
                count_noun(playing, "sound", "sounds"),
                loading
            )
        } else if playing > 0 {
            format!("{} playing", count_noun(playing, "sound", "sounds"))
        } else {
            format!("Loading {}", count_noun(loading, "sound", "sounds"))
        };

        Some(Self {
            title: NOTIFICATION_TITLE.to_string(),
            body,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Surface
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification backend error: {0}")]
    Backend(String),
}

impl ErrorCode for NotificationError {
    fn code(&self) -> &'static str {
        match self {
            Self::Backend(_) => "notification_failed",
        }
    }
}

pub type NotificationResult<T> = Result<T, NotificationError>;

/// Where the notification is rendered.
///
/// `show` is called again with new content whenever the body changes;
/// implementations should update the existing notification in place.
#[async_trait]
pub trait NotificationSurface: Send + Sync {
    async fn show(&self, content: &NotificationContent) -> NotificationResult<()>;

    async fn dismiss(&self) -> NotificationResult<()>;

    /// Short surface name for logs.
    fn name(&self) -> &'static str;
}

/// Surface that writes notification changes to the log.
pub struct LoggingNotificationSurface;

#[async_trait]
impl NotificationSurface for LoggingNotificationSurface {
    async fn show(&self, content: &NotificationContent) -> NotificationResult<()> {
        log::info!("[Notification] {}: {}", content.title, content.body);
        Ok(())
    }

    async fn dismiss(&self) -> NotificationResult<()> {
        log::info!("[Notification] Dismissed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Surface that discards everything.
pub struct NoopNotificationSurface;

#[async_trait]
impl NotificationSurface for NoopNotificationSurface {
    async fn show(&self, _content: &NotificationContent) -> NotificationResult<()> {
        Ok(())
    }

    async fn dismiss(&self) -> NotificationResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Presenter
// ─────────────────────────────────────────────────────────────────────────────

/// Mixer observer that drives a [`NotificationSurface`].
pub struct NotificationPresenter {
    tx: watch::Sender<MixerSnapshot>,
    finished: CancellationToken,
}

impl NotificationPresenter {
    /// Spawns the presenter task and returns the observer to register.
    ///
    /// The task runs until `cancel` fires, then dismisses any visible
    /// notification.
    pub fn start(
        surface: Arc<dyn NotificationSurface>,
        spawner: &TokioSpawner,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let (tx, rx) = watch::channel(MixerSnapshot::default());
        let finished = CancellationToken::new();
        log::info!("[Notification] Using {} surface", surface.name());
        spawner.spawn(run_presenter(rx, surface, cancel, finished.clone()));
        Arc::new(Self { tx, finished })
    }

    /// Waits until the presenter task has exited.
    pub async fn closed(&self) {
        self.finished.cancelled().await;
    }
}

impl MixerObserver for NotificationPresenter {
    fn on_state_changed(&self, snapshot: &MixerSnapshot) {
        self.tx.send_replace(snapshot.without_error());
    }
}

async fn run_presenter(
    mut rx: watch::Receiver<MixerSnapshot>,
    surface: Arc<dyn NotificationSurface>,
    cancel: CancellationToken,
    finished: CancellationToken,
) {
    let mut shown: Option<NotificationContent> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
        let desired = NotificationContent::for_snapshot(&rx.borrow_and_update());
        apply(surface.as_ref(), &mut shown, desired).await;
    }

    apply(surface.as_ref(), &mut shown, None).await;
    finished.cancel();
}

/// Brings the surface in line with `desired`, skipping redundant calls.
async fn apply(
    surface: &dyn NotificationSurface,
    shown: &mut Option<NotificationContent>,
    desired: Option<NotificationContent>,
) {
    match desired {
        Some(content) if shown.as_ref() != Some(&content) => {
            match surface.show(&content).await {
                Ok(()) => *shown = Some(content),
                Err(e) => log::warn!("[Notification] Failed to show: {}", e),
            }
        }
        Some(_) => {}
        None if shown.is_some() => {
            if let Err(e) = surface.dismiss().await {
                log::warn!("[Notification] Failed to dismiss: {}", e);
            }
            *shown = None;
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSurface {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationSurface for RecordingSurface {
        async fn show(&self, content: &NotificationContent) -> NotificationResult<()> {
            self.calls.lock().push(format!("show:{}", content.body));
            Ok(())
        }

        async fn dismiss(&self) -> NotificationResult<()> {
            self.calls.lock().push("dismiss".to_string());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn snapshot(playing: &[&str], loading: &[&str], paused: bool) -> MixerSnapshot {
        MixerSnapshot {
            is_active: !playing.is_empty() || !loading.is_empty(),
            is_paused: paused,
            playing: playing.iter().map(|s| s.to_string()).collect(),
            loading: loading.iter().map(|s| s.to_string()).collect(),
            last_error: None,
        }
    }

    async fn wait_for_calls(surface: &RecordingSurface, count: usize) -> Vec<String> {
        for _ in 0..200 {
            if surface.calls.lock().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        surface.calls.lock().clone()
    }

    #[test]
    fn content_reflects_playing_count() {
        assert_eq!(NotificationContent::for_snapshot(&snapshot(&[], &[], false)), None);

        let content = NotificationContent::for_snapshot(&snapshot(&["rain"], &[], false)).unwrap();
        assert_eq!(content.title, "relaxation sounds active");
        assert_eq!(content.body, "1 sound playing");

        let body = |s: MixerSnapshot| NotificationContent::for_snapshot(&s).unwrap().body;
        assert_eq!(body(snapshot(&["rain", "wind"], &[], false)), "2 sounds playing");
        assert_eq!(body(snapshot(&["rain", "wind"], &[], true)), "2 sounds paused");
        assert_eq!(body(snapshot(&[], &["rain"], false)), "Loading 1 sound");
        assert_eq!(body(snapshot(&["rain"], &["wind"], false)), "1 sound playing, 1 loading");
        assert_eq!(body(snapshot(&[], &["rain"], true)), "Paused");
    }

    #[tokio::test]
    async fn shows_while_active_and_dismisses_when_empty() {
        let surface = Arc::new(RecordingSurface::default());
        let cancel = CancellationToken::new();
        let presenter =
            NotificationPresenter::start(surface.clone(), &TokioSpawner::current(), cancel.clone());

        presenter.on_state_changed(&snapshot(&["rain"], &[], false));
        wait_for_calls(&surface, 1).await;
        presenter.on_state_changed(&snapshot(&["rain", "wind"], &[], false));
        wait_for_calls(&surface, 2).await;
        presenter.on_state_changed(&snapshot(&[], &[], false));
        let calls = wait_for_calls(&surface, 3).await;

        assert_eq!(
            calls,
            vec!["show:1 sound playing", "show:2 sounds playing", "dismiss"]
        );
        cancel.cancel();
        presenter.closed().await;
    }

    #[tokio::test]
    async fn identical_content_is_not_reshown() {
        let surface = Arc::new(RecordingSurface::default());
        let cancel = CancellationToken::new();
        let presenter =
            NotificationPresenter::start(surface.clone(), &TokioSpawner::current(), cancel.clone());

        presenter.on_state_changed(&snapshot(&["rain"], &[], false));
        wait_for_calls(&surface, 1).await;
        presenter.on_state_changed(&snapshot(&["wind"], &[], false));
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(surface.calls.lock().len(), 1);
        cancel.cancel();
        presenter.closed().await;
    }

    #[tokio::test]
    async fn cancellation_dismisses_visible_notification() {
        let surface = Arc::new(RecordingSurface::default());
        let cancel = CancellationToken::new();
        let presenter =
            NotificationPresenter::start(surface.clone(), &TokioSpawner::current(), cancel.clone());

        presenter.on_state_changed(&snapshot(&["rain"], &[], false));
        wait_for_calls(&surface, 1).await;
        cancel.cancel();
        presenter.closed().await;

        assert_eq!(
            surface.calls.lock().clone(),
            vec!["show:1 sound playing", "dismiss"]
        );
    }
}
