use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info};

#[derive(Default)]
struct Tracked {
    tasks: JoinSet<()>,
    closed: bool,
}

/// Websocket tasks of one listener.
///
/// axum upgrades connections outside of the listener's graceful shutdown, so
/// the listener keeps its own handle on them and ends them on close.
#[derive(Clone, Default)]
pub struct SocketTasks {
    inner: Arc<Mutex<Tracked>>,
}

impl SocketTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `task` until it finishes or the tasks are shut down.
    /// Refused once [`SocketTasks::shutdown`] started.
    pub fn spawn<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tracked = self.lock();
        if tracked.closed {
            return false;
        }
        while tracked.tasks.try_join_next().is_some() {}
        tracked.tasks.spawn(task);
        true
    }

    /// Sockets still running.
    pub fn len(&self) -> usize {
        let mut tracked = self.lock();
        while tracked.tasks.try_join_next().is_some() {}
        tracked.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gives the sockets `grace` to finish on their own, then aborts the rest.
    /// Returns once every socket task has ended.
    pub async fn shutdown(&self, grace: Duration) {
        let mut tasks = {
            let mut tracked = self.lock();
            tracked.closed = true;
            std::mem::take(&mut tracked.tasks)
        };

        let drained = tokio::time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            info!("Aborting {} websocket tasks", tasks.len());
            tasks.shutdown().await;
        } else {
            debug!("Websocket tasks drained");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tracked> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
