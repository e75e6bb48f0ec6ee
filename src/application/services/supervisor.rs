//! Supervision for plugin background tasks

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::application::errors::BotError;

/// Receiver side of the host shutdown broadcast
#[derive(Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Wait until shutdown starts
    pub async fn wait(&mut self) {
        while !*self.0.borrow_and_update() {
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Owns every background task plugins spawn through their context
pub struct TaskSupervisor {
    tasks: Mutex<JoinSet<()>>,
    shutdown: watch::Sender<bool>,
}

impl Default for TaskSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskSupervisor {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            tasks: Mutex::new(JoinSet::new()),
            shutdown,
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal(self.shutdown.subscribe())
    }

    /// Spawn `task`; an error it returns is logged, never propagated
    pub fn spawn<F>(&self, owner: &str, name: &str, task: F)
    where
        F: Future<Output = Result<(), BotError>> + Send + 'static,
    {
        let label = format!("{}/{}", owner, name);
        let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
        reap(&mut tasks);
        debug!("Spawning background task {}", label);
        tasks.spawn(async move {
            match task.await {
                Ok(()) => debug!("Background task {} finished", label),
                Err(e) => error!("Background task {} failed: {}", label, e),
            }
        });
    }

    /// Tasks still running
    pub fn active(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
        reap(&mut tasks);
        tasks.len()
    }

    /// Signal shutdown, give tasks `grace` to finish, abort the rest.
    ///
    /// Returns how many tasks had to be aborted.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        self.shutdown.send_replace(true);
        let mut tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::take(&mut *guard)
        };

        let finished = tokio::time::timeout(grace, async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    if e.is_panic() {
                        error!("Background task panicked: {}", e);
                    }
                }
            }
        })
        .await;

        if finished.is_ok() {
            return 0;
        }

        let remaining = tasks.len();
        warn!("Aborting {} background tasks still running after {:?}", remaining, grace);
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
        remaining
    }
}

/// Drop finished tasks from the set without waiting
fn reap(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        if let Err(e) = result {
            if e.is_panic() {
                error!("Background task panicked: {}", e);
            }
        }
    }
}
