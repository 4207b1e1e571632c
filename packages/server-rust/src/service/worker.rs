//! Background housekeeping.
//!
//! [`BackgroundWorker`] drives a [`BackgroundRunnable`] on its own task,
//! calling it on a fixed tick until stopped. The server uses it to run
//! [`SessionSweeper`], which drops idle sessions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::security::SessionStore;

// ---------------------------------------------------------------------------
// BackgroundRunnable
// ---------------------------------------------------------------------------

/// Periodic work executed by a [`BackgroundWorker`].
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    /// Runs on every tick.
    async fn on_tick(&mut self);

    /// Runs once after the worker loop exits. Default is a no-op.
    async fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// BackgroundWorker
// ---------------------------------------------------------------------------

/// Handle to a spawned worker loop.
pub struct BackgroundWorker {
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundWorker {
    /// Spawns the worker loop. The first tick fires one full `tick` after
    /// start, not immediately.
    pub fn start<R: BackgroundRunnable>(mut runnable: R, tick: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + tick, tick);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => runnable.on_tick().await,
                }
            }
            runnable.shutdown().await;
        });

        Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Whether the loop is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the loop and waits for the runnable's shutdown hook.
    pub async fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

// ---------------------------------------------------------------------------
// SessionSweeper
// ---------------------------------------------------------------------------

/// Purges idle sessions on every tick.
#[derive(Debug)]
pub struct SessionSweeper {
    sessions: Arc<SessionStore>,
}

impl SessionSweeper {
    #[must_use]
    pub fn new(sessions: Arc<SessionStore>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl BackgroundRunnable for SessionSweeper {
    async fn on_tick(&mut self) {
        let purged = self.sessions.purge_expired();
        if purged > 0 {
            info!(purged, remaining = self.sessions.len(), "idle sessions purged");
        }
    }

    async fn shutdown(&mut self) {
        debug!(remaining = self.sessions.len(), "session sweeper stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
