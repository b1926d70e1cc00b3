use std::sync::atomic::{AtomicU64, Ordering};

use crate::stat::{RingLifecycle, WindowWrap};

/// Per-bucket outcome counts for the exception breakers.
#[derive(Default)]
pub(crate) struct ErrorCounter {
    pub(crate) error_count: AtomicU64,
    pub(crate) total_count: AtomicU64,
}

impl ErrorCounter {
    pub(crate) fn reset(&self) {
        self.error_count.store(0, Ordering::Relaxed);
        self.total_count.store(0, Ordering::Relaxed);
    }
}

pub(crate) struct ErrorCounterLifecycle;

impl RingLifecycle for ErrorCounterLifecycle {
    type Bucket = ErrorCounter;

    fn new_empty_bucket(&self, _time_ms: u64) -> ErrorCounter {
        ErrorCounter::default()
    }

    fn reset_window(&self, wrap: &WindowWrap<ErrorCounter>, start_ms: u64) {
        wrap.reset_start(start_ms);
        wrap.value().reset();
    }
}

/// Per-bucket outcome counts for the slow-call breaker.
#[derive(Default)]
pub(crate) struct SlowCounter {
    pub(crate) slow_count: AtomicU64,
    pub(crate) total_count: AtomicU64,
}

impl SlowCounter {
    pub(crate) fn reset(&self) {
        self.slow_count.store(0, Ordering::Relaxed);
        self.total_count.store(0, Ordering::Relaxed);
    }
}

pub(crate) struct SlowCounterLifecycle;

impl RingLifecycle for SlowCounterLifecycle {
    type Bucket = SlowCounter;

    fn new_empty_bucket(&self, _time_ms: u64) -> SlowCounter {
        SlowCounter::default()
    }

    fn reset_window(&self, wrap: &WindowWrap<SlowCounter>, start_ms: u64) {
        wrap.reset_start(start_ms);
        wrap.value().reset();
    }
}
