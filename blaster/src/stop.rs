use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug)]
struct Inner {
    is_running: AtomicBool,
    notify: Notify,
}

/// Shared "is running" flag that can also be awaited.
///
/// Waiting on it lets parked tasks, e.g. a limiter sleeping for the next
/// token or a worker blocked on an empty ticket queue, exit immediately.
#[derive(Debug, Clone)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl StopSignal {
    pub fn new() -> Self {
        let inner = Inner {
            is_running: AtomicBool::new(true),
            notify: Notify::new(),
        };

        Self { inner: Arc::new(inner) }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.inner.is_running.load(Ordering::SeqCst)
    }

    /// Trips the flag and wakes everyone waiting in [`StopSignal::stopped`].
    pub fn stop(&self) {
        self.inner.is_running.store(false, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Completes once [`StopSignal::stop`] has been called.
    pub async fn stopped(&self) {
        loop {
            // Registered before the check, so a concurrent stop is not lost.
            let notified = self.inner.notify.notified();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
