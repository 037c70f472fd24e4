//! A single cooperative cancellation primitive used by every stoppable
//! construct in the crate (instructions, runners, wait racers, repeat loops).
//!
//! One `StopFlag`, backed by `tokio::sync::Notify`, rather than a
//! different ad-hoc flag per instruction kind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// A flag that starts unset, can be set exactly once meaningfully (setting it
/// again is a no-op), and can be awaited by any number of tasks.
#[derive(Debug, Default)]
pub struct StopFlag {
    set: AtomicBool,
    notify: Notify,
}

impl StopFlag {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sets the flag and wakes every task currently waiting on it.
    pub fn set(&self) {
        self.set.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::SeqCst)
    }

    /// Resolves once the flag has been set. Returns immediately if it was
    /// already set before this call.
    pub async fn wait(&self) {
        loop {
            if self.is_set() {
                return;
            }
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Re-check after registering for notification to close the race
            // between the check above and a concurrent `set()`.
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }

    /// Waits for the flag to become set, up to `timeout`. Returns `true` if
    /// the flag was (or became) set, `false` if the timeout elapsed first.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_set() {
            return true;
        }
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }
}
