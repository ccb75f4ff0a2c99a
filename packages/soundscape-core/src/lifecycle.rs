//! Service lifecycle supervision.
//!
//! The mixer lives inside a long-running service process that UI clients
//! attach to and detach from. [`MixerService`] owns the mixer across those
//! attachments: the mixer is created lazily when the first client arrives,
//! keeps playing after every client has gone as long as sounds are active,
//! and is torn down when the process is reclaimed or shut down.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::mixer::{spawn_mixer, MixerDeps, MixerHandle};
use crate::runtime::{TaskSpawner, TokioSpawner};

/// Hooks the host calls as clients come and go.
#[async_trait]
pub trait ServiceLifecycle: Send + Sync {
    /// The client count went from zero to one.
    async fn on_first_client_attached(&self);

    /// The client count dropped back to zero.
    async fn on_last_client_detached(&self);

    /// The host is about to kill the process (task removed, SIGTERM).
    ///
    /// Implementations must stop all playback before returning.
    async fn on_process_reclaimed(&self);
}

/// Supervisor that owns the mixer on behalf of attached clients.
pub struct MixerService {
    deps: MixerDeps,
    cancel: CancellationToken,
    mixer: tokio::sync::Mutex<Option<MixerHandle>>,
    clients: AtomicUsize,
    spawner: TokioSpawner,
}

impl MixerService {
    /// Creates the supervisor. No mixer runs until [`handle`](Self::handle)
    /// or [`attach`](Self::attach) is called.
    pub fn new(deps: MixerDeps, cancel: CancellationToken) -> Arc<Self> {
        let spawner = deps.spawner.clone();
        Arc::new(Self {
            deps,
            cancel,
            mixer: tokio::sync::Mutex::new(None),
            clients: AtomicUsize::new(0),
            spawner,
        })
    }

    /// Returns the running mixer, starting a fresh one if none is running.
    pub async fn handle(&self) -> MixerHandle {
        let mut slot = self.mixer.lock().await;
        match slot.as_ref() {
            Some(handle) if !handle.is_closed() => handle.clone(),
            _ => {
                log::info!("[Lifecycle] Starting mixer");
                let handle = spawn_mixer(&self.deps, self.cancel.child_token());
                *slot = Some(handle.clone());
                handle
            }
        }
    }

    /// Returns true while a mixer instance exists.
    pub async fn is_running(&self) -> bool {
        self.mixer
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_closed())
    }

    /// Number of currently attached clients.
    pub fn client_count(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }

    /// Registers a client. The returned binding detaches it when dropped.
    pub async fn attach(self: &Arc<Self>) -> MixerBinding {
        let previous = self.clients.fetch_add(1, Ordering::SeqCst);
        log::debug!("[Lifecycle] Client attached ({} total)", previous + 1);
        if previous == 0 {
            self.on_first_client_attached().await;
        }
        MixerBinding {
            service: Arc::clone(self),
        }
    }

    fn detach(self: &Arc<Self>) {
        let previous = self.clients.fetch_sub(1, Ordering::SeqCst);
        log::debug!("[Lifecycle] Client detached ({} remaining)", previous - 1);
        if previous == 1 {
            let service = Arc::clone(self);
            self.spawner.spawn(async move {
                service.on_last_client_detached().await;
            });
        }
    }

    /// Stops every track and shuts the mixer down.
    ///
    /// Returns the number of tracks that were released.
    pub async fn shutdown(&self) -> usize {
        let Some(handle) = self.mixer.lock().await.take() else {
            return 0;
        };
        let released = handle.stop_all().await.unwrap_or(0);
        handle.shutdown();
        log::info!("[Lifecycle] Mixer shut down ({} track(s) stopped)", released);
        released
    }
}

#[async_trait]
impl ServiceLifecycle for MixerService {
    async fn on_first_client_attached(&self) {
        self.handle().await;
    }

    async fn on_last_client_detached(&self) {
        let mut slot = self.mixer.lock().await;
        // A client may have re-attached while this hook was queued.
        if self.client_count() > 0 {
            return;
        }
        let Some(handle) = slot.as_ref() else {
            return;
        };
        match handle.is_active().await {
            Ok(true) => {
                log::info!("[Lifecycle] No clients left; mixer keeps playing in background");
            }
            Ok(false) | Err(_) => {
                log::info!("[Lifecycle] No clients left and nothing playing; releasing mixer");
                handle.shutdown();
                *slot = None;
            }
        }
    }

    async fn on_process_reclaimed(&self) {
        log::warn!("[Lifecycle] Process reclaimed; stopping all sounds");
        self.shutdown().await;
    }
}

/// RAII guard for an attached client.
pub struct MixerBinding {
    service: Arc<MixerService>,
}

impl MixerBinding {
    /// The supervisor this binding is attached to.
    pub fn service(&self) -> &Arc<MixerService> {
        &self.service
    }
}

impl Drop for MixerBinding {
    fn drop(&mut self) {
        self.service.detach();
    }
}
