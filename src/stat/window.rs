use std::sync::atomic::{AtomicU64, Ordering};

/// A bucket paired with the time slice it covers.
///
/// `start_ms` is always aligned to `window_length_ms`. The wrapper is
/// shared behind an `Arc` in the ring slot; recycling rewrites `start_ms`
/// in place (under the ring's reset lock) instead of reallocating.
pub(crate) struct WindowWrap<B> {
    window_length_ms: u64,
    start_ms: AtomicU64,
    value: B,
}

impl<B> WindowWrap<B> {
    pub(crate) fn new(window_length_ms: u64, start_ms: u64, value: B) -> Self {
        Self {
            window_length_ms,
            start_ms: AtomicU64::new(start_ms),
            value,
        }
    }

    #[inline]
    pub(crate) fn start_ms(&self) -> u64 {
        self.start_ms.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn window_length_ms(&self) -> u64 {
        self.window_length_ms
    }

    #[inline]
    pub(crate) fn value(&self) -> &B {
        &self.value
    }

    /// Whether `time_ms` falls inside this window.
    #[inline]
    pub(crate) fn contains(&self, time_ms: u64) -> bool {
        let start = self.start_ms();
        start <= time_ms && time_ms < start + self.window_length_ms
    }

    /// Move the window to a new start. Caller must hold the ring's reset
    /// lock and reset the bucket value alongside.
    pub(crate) fn reset_start(&self, start_ms: u64) {
        self.start_ms.store(start_ms, Ordering::Release);
    }
}
