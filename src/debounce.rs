//! Trailing-edge debouncer backed by a tokio timer task.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

/// Coalesces bursts of triggers into one action run `delay` after the last trigger.
///
/// At most one invocation is pending. Dropping the debouncer cancels it. An
/// action that has already started runs on its own task and is not cancelled.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `action`, replacing any invocation still waiting for its delay.
    ///
    /// Must be called from within a tokio runtime.
    pub fn debounce<F, Fut>(&self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let deadline = Instant::now() + self.delay;
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            tokio::spawn(action());
        });
        let mut slot = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(prev) = slot.replace(timer) {
            if !prev.is_finished() {
                trace!("debounce window restarted");
            }
            prev.abort();
        }
    }

    /// Drop the pending invocation, if any, without running it.
    pub fn cancel(&self) {
        let mut slot = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
