//! Cooperative cancellation token
//!
//! Checked by the planner before each chunk send. Listeners run exactly
//! once; registering on an already-cancelled token fires immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

type Listener = Box<dyn FnOnce() + Send>;

/// Clone-shareable cancellation flag with one-shot listeners
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    listeners: Mutex<Vec<Listener>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the flag and fire every registered listener
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        let listeners = std::mem::take(&mut *self.inner.listeners.lock());
        for listener in listeners {
            listener();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Register a listener; runs immediately if already cancelled
    pub fn on_cancel(&self, listener: impl FnOnce() + Send + 'static) {
        if self.is_cancelled() {
            listener();
            return;
        }

        let mut listeners = self.inner.listeners.lock();
        // Re-check under the lock so a concurrent cancel cannot strand us
        if self.is_cancelled() {
            drop(listeners);
            listener();
        } else {
            listeners.push(Box::new(listener));
        }
    }
}
