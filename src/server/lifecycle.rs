//! Server lifecycle: `Stopped -> Running -> Stopping -> Stopped`

use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::watch;

/// Observable server state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Running,
    Stopping,
}

const STOPPED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPING: u8 = 2;

/// Shared lifecycle state and shutdown trigger
///
/// Written from request handlers and signal tasks, read by the accept loop.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
    stop: watch::Sender<bool>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            state: AtomicU8::new(STOPPED),
            stop,
        }
    }

    /// Current state
    pub fn state(&self) -> ServerState {
        match self.state.load(Ordering::Acquire) {
            RUNNING => ServerState::Running,
            STOPPING => ServerState::Stopping,
            _ => ServerState::Stopped,
        }
    }

    /// Request a graceful stop. Idempotent; returns true for the first call.
    pub fn trigger(&self) -> bool {
        let already = self.stop.send_replace(true);
        if !already {
            let _ = self.state.compare_exchange(
                RUNNING,
                STOPPING,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
            tracing::info!("Shutdown requested");
        }
        !already
    }

    /// Whether a stop has been requested
    pub fn is_triggered(&self) -> bool {
        *self.stop.borrow()
    }

    /// Resolves once a stop has been requested
    pub async fn stopped(&self) {
        let mut rx = self.stop.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|stop| *stop).await;
    }

    pub(crate) fn set_running(&self) {
        // A stop requested before the listener started still wins
        let next = if self.is_triggered() { STOPPING } else { RUNNING };
        self.state.store(next, Ordering::Release);
    }

    pub(crate) fn set_stopped(&self) {
        self.state.store(STOPPED, Ordering::Release);
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
