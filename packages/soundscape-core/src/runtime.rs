//! Task spawning abstraction.
//!
//! The mixer, its track loaders and the notification presenter all run as
//! background tasks. They are handed a [`TaskSpawner`] instead of calling
//! `tokio::spawn` so that the composition root decides which runtime they land
//! on (the server's main runtime, or a test runtime).

use std::future::Future;

/// Abstraction for spawning background tasks.
///
/// Spawned tasks are detached: the spawner offers no join handle. Work that
/// must be stopped is tied to a `CancellationToken` by the caller.
///
/// # Example
///
/// ```ignore
/// struct Presenter<S: TaskSpawner> {
///     spawner: S,
/// }
///
/// impl<S: TaskSpawner> Presenter<S> {
///     fn start(&self) {
///         self.spawner.spawn(async {
///             // drain state updates
///         });
///     }
/// }
/// ```
pub trait TaskSpawner: Send + Sync {
    /// Spawns a future as a background task.
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Tokio-based spawner.
///
/// Holds a runtime handle, so it can be used from threads that are not
/// themselves inside the runtime (e.g. a `Drop` impl on a binding guard).
#[derive(Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    /// Creates a new `TokioSpawner` with the given runtime handle.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Creates a new `TokioSpawner` using the current runtime's handle.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
    }

    /// Returns the underlying runtime handle.
    #[must_use]
    pub fn handle(&self) -> &tokio::runtime::Handle {
        &self.handle
    }
}

impl TaskSpawner for TokioSpawner {
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn tokio_spawner_executes_task() {
        let spawner = TokioSpawner::current();
        let executed = Arc::new(AtomicBool::new(false));
        let executed_clone = executed.clone();

        spawner.spawn(async move {
            executed_clone.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert!(executed.load(Ordering::SeqCst));
    }

    #[test]
    fn spawner_works_from_outside_the_runtime() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let spawner = TokioSpawner::new(rt.handle().clone());
        let (tx, rx) = tokio::sync::oneshot::channel();

        spawner.spawn(async move {
            let _ = tx.send(7u8);
        });

        assert_eq!(rt.block_on(rx).unwrap(), 7);
    }
}
