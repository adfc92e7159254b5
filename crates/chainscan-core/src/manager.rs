//! Service manager — owns the background tasks and joins them on shutdown.
//!
//! Services never register themselves. The manager spawns each one into a
//! [`JoinSet`] it owns, hands it a child [`CancellationToken`], and observes
//! its closure by joining the task.

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Name reported for a task that panicked instead of returning.
pub const PANICKED: &str = "<panicked>";

/// A long-lived background service.
#[async_trait]
pub trait Service: Send + 'static {
    /// Name used for registration and logging.
    fn name(&self) -> &'static str;

    /// Run until `shutdown` is cancelled (or the service has nothing left to do).
    async fn run(self: Box<Self>, shutdown: CancellationToken);
}

/// Owner of all running services.
pub struct Manager {
    shutdown: CancellationToken,
    tasks: JoinSet<&'static str>,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl Manager {
    pub fn new() -> Self {
        Self {
            shutdown: CancellationToken::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Spawn `service` on the runtime. Must be called from within a Tokio runtime.
    pub fn start<S: Service>(&mut self, service: S) {
        let name = service.name();
        let token = self.shutdown.child_token();
        info!(service = name, "starting service");
        self.tasks.spawn(async move {
            Box::new(service).run(token).await;
            name
        });
    }

    /// Signal every service to stop. Safe to call any number of times.
    pub fn stop(&self) {
        if !self.shutdown.is_cancelled() {
            info!(services = self.tasks.len(), "stopping services");
        }
        self.shutdown.cancel();
    }

    /// Returns `true` once [`stop`](Self::stop) has been called.
    pub fn is_stopping(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// A clone of the root token, e.g. to wire up a signal handler.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Number of services that have not been joined yet.
    pub fn running(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for the next service to close and return its name.
    ///
    /// Returns `None` when no services are left.
    pub async fn next_closed(&mut self) -> Option<&'static str> {
        let joined = self.tasks.join_next().await?;
        Some(match joined {
            Ok(name) => {
                info!(service = name, "service closed");
                name
            }
            Err(e) => {
                error!(error = %e, "service task failed");
                PANICKED
            }
        })
    }

    /// Wait for every service to close. Each closure is reported exactly once,
    /// in completion order.
    pub async fn join(&mut self) -> Vec<&'static str> {
        let mut closed = Vec::with_capacity(self.tasks.len());
        while let Some(name) = self.next_closed().await {
            closed.push(name);
        }
        closed
    }

    /// Stop every service and wait for all of them to close.
    pub async fn shutdown(mut self) -> Vec<&'static str> {
        self.stop();
        self.join().await
    }
}
