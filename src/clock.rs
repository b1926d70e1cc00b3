use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Single monotone millisecond source for the whole engine.
///
/// All statistics and admission decisions are driven by one clock so that
/// bucket alignment, staleness checks and retry deadlines agree with each
/// other. Skew tolerance is limited to one window length; the clock never
/// goes backwards.
pub struct Clock {
    start: Instant,
    offset_ms: AtomicU64,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }

    /// Milliseconds elapsed since the clock was created.
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64 + self.offset_ms.load(Ordering::Relaxed)
    }

    /// Jump the clock forward. Test hook only; production time always comes
    /// from [`Instant`].
    #[cfg(test)]
    pub(crate) fn advance_ms(&self, delta: u64) {
        self.offset_ms.fetch_add(delta, Ordering::Relaxed);
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
