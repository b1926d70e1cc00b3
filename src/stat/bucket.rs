use std::sync::atomic::{AtomicU64, Ordering};

/// Event kinds aggregated per bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MetricEvent {
    Pass,
    Block,
    Exception,
    Success,
    /// Sum of response times, in milliseconds.
    Rt,
    /// Passes that were pre-booked into a future bucket by a priority wait.
    OccupiedPass,
}

const EVENT_COUNT: usize = 6;

impl MetricEvent {
    #[inline]
    fn idx(self) -> usize {
        match self {
            MetricEvent::Pass => 0,
            MetricEvent::Block => 1,
            MetricEvent::Exception => 2,
            MetricEvent::Success => 3,
            MetricEvent::Rt => 4,
            MetricEvent::OccupiedPass => 5,
        }
    }
}

/// Counters for the events that happened inside one window slice.
///
/// All counters are monotone for the lifetime of the bucket; [`reset`]
/// (taken only while the owning slot is recycled) is the single decrement
/// path. Additions are plain relaxed atomics, so concurrent writers never
/// lose updates but no cross-counter snapshot is transactional.
///
/// [`reset`]: MetricBucket::reset
pub(crate) struct MetricBucket {
    counters: [AtomicU64; EVENT_COUNT],
    min_rt: AtomicU64,
    /// Ceiling `min_rt` resets to; everything slower is treated as this.
    max_rt_ms: u64,
}

impl MetricBucket {
    pub(crate) fn new(max_rt_ms: u64) -> Self {
        Self {
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
            min_rt: AtomicU64::new(max_rt_ms),
            max_rt_ms,
        }
    }

    #[inline]
    pub(crate) fn get(&self, event: MetricEvent) -> u64 {
        self.counters[event.idx()].load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn add(&self, event: MetricEvent, count: u64) {
        self.counters[event.idx()].fetch_add(count, Ordering::Relaxed);
    }

    /// Record one response time: adds to the sum and keeps the minimum.
    pub(crate) fn add_rt(&self, rt_ms: u64) {
        self.add(MetricEvent::Rt, rt_ms);
        self.min_rt.fetch_min(rt_ms, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn pass(&self) -> u64 {
        self.get(MetricEvent::Pass)
    }

    #[inline]
    pub(crate) fn success(&self) -> u64 {
        self.get(MetricEvent::Success)
    }

    #[inline]
    pub(crate) fn min_rt(&self) -> u64 {
        self.min_rt.load(Ordering::Relaxed)
    }

    /// Zero every counter. Only called while the slot is being recycled
    /// under the ring's reset lock; readers racing with a reset may observe
    /// a mix of old and new values for one bucket width, which is the
    /// documented accuracy bound.
    pub(crate) fn reset(&self) {
        for counter in &self.counters {
            counter.store(0, Ordering::Relaxed);
        }
        self.min_rt.store(self.max_rt_ms, Ordering::Relaxed);
    }
}
