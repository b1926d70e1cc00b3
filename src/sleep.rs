use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Cancellable bounded sleep used for priority waits.
///
/// A prioritized request that borrows a future bucket slot must park the
/// calling thread until that slot becomes current. The park is a condvar
/// wait rather than a plain `thread::sleep` so it can be cut short: a
/// cancel (or a spurious wakeup) ends the wait early and the request is
/// then admitted with zero remaining wait.
pub(crate) struct WaitGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    cancelled: Mutex<bool>,
    cond: Condvar,
}

impl WaitGate {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(GateInner {
                cancelled: Mutex::new(false),
                cond: Condvar::new(),
            }),
        }
    }

    /// Handle that can end the wait from another thread.
    pub(crate) fn canceller(&self) -> WaitCanceller {
        WaitCanceller {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Park the current thread for up to `duration`.
    ///
    /// Returns `true` when the wait ended early (cancelled or woken),
    /// `false` when the full duration elapsed. Either way the caller
    /// proceeds to admit the request.
    pub(crate) fn wait_for(&self, duration: Duration) -> bool {
        let mut cancelled = self.inner.cancelled.lock();
        if *cancelled {
            return true;
        }
        let result = self.inner.cond.wait_for(&mut cancelled, duration);
        *cancelled || !result.timed_out()
    }
}

/// Cloneable cancel handle for a [`WaitGate`].
#[derive(Clone)]
pub(crate) struct WaitCanceller {
    inner: Arc<GateInner>,
}

impl WaitCanceller {
    pub(crate) fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock();
        *cancelled = true;
        self.inner.cond.notify_all();
    }
}
