use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use crate::stat::window::WindowWrap;

/// Hooks that distinguish the ring flavours.
///
/// Every ring shares the same slot selection and recycling machinery; what
/// differs is how a fresh bucket is born, how a stale slot is re-armed and
/// when a slot counts as stale. The standard metric ring ages a slot out
/// once it has fallen a whole interval behind; the future-only borrow ring
/// considers a slot stale the moment its scheduled instant arrives, so the
/// occupiable ring can absorb it.
pub(crate) trait RingLifecycle {
    type Bucket;

    fn new_empty_bucket(&self, time_ms: u64) -> Self::Bucket;

    /// Re-arm a recycled slot at `start_ms`. Called under the reset lock.
    fn reset_window(&self, wrap: &WindowWrap<Self::Bucket>, start_ms: u64);

    fn is_stale(&self, time_ms: u64, wrap: &WindowWrap<Self::Bucket>, interval_ms: u64) -> bool {
        time_ms.saturating_sub(wrap.start_ms()) >= interval_ms
    }
}

/// Time-indexed ring of buckets covering a sliding `interval_ms` horizon.
///
/// Slot selection maps time `t` to index `⌊t / window_length⌋ mod
/// sample_count`. The hot path is lock-free: one atomic load plus a start
/// comparison. Installing a bucket into an empty slot is a CAS; recycling
/// a stale slot takes a short per-ring mutex whose only purpose is to keep
/// the start rewrite and the counter reset together. Contenders on either
/// slow path yield and retry.
pub(crate) struct LeapArray<L: RingLifecycle> {
    window_length_ms: u64,
    sample_count: usize,
    interval_ms: u64,
    slots: Box<[ArcSwapOption<WindowWrap<L::Bucket>>]>,
    reset_lock: Mutex<()>,
    lifecycle: L,
}

impl<L: RingLifecycle> LeapArray<L> {
    pub(crate) fn new(sample_count: u32, interval_ms: u32, lifecycle: L) -> Self {
        assert!(sample_count > 0, "bucket count must be positive");
        assert!(interval_ms > 0, "window interval must be positive");
        assert!(
            interval_ms % sample_count == 0,
            "interval must divide evenly into buckets"
        );

        let sample_count = sample_count as usize;
        let slots = (0..sample_count)
            .map(|_| ArcSwapOption::empty())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            window_length_ms: (interval_ms as usize / sample_count) as u64,
            sample_count,
            interval_ms: interval_ms as u64,
            slots,
            reset_lock: Mutex::new(()),
            lifecycle,
        }
    } // end constructor

    #[inline]
    pub(crate) fn window_length_ms(&self) -> u64 {
        self.window_length_ms
    }

    #[inline]
    pub(crate) fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    #[inline]
    pub(crate) fn interval_seconds(&self) -> f64 {
        self.interval_ms as f64 / 1000.0
    }

    #[inline]
    pub(crate) fn sample_count(&self) -> u32 {
        self.sample_count as u32
    }

    #[inline]
    fn slot_index(&self, time_ms: u64) -> usize {
        ((time_ms / self.window_length_ms) as usize) % self.sample_count
    }

    #[inline]
    fn window_start(&self, time_ms: u64) -> u64 {
        time_ms - time_ms % self.window_length_ms
    }

    /// The unique window containing `time_ms`, created or recycled on
    /// demand.
    ///
    /// Three slot states are possible:
    /// - empty: CAS-install a fresh window; the loser yields and retries
    /// - current: return it (the ≥99% fast path)
    /// - stale: reset start and counters under the reset lock
    ///
    /// A slot that is *newer* than `time_ms` means the caller's clock went
    /// backwards; a detached window is handed out so counting still works
    /// without corrupting the ring.
    pub(crate) fn current_window(&self, time_ms: u64) -> Arc<WindowWrap<L::Bucket>> {
        let idx = self.slot_index(time_ms);
        let start = self.window_start(time_ms);
        let slot = &self.slots[idx];

        loop {
            match slot.load_full() {
                None => {
                    let fresh = Arc::new(WindowWrap::new(
                        self.window_length_ms,
                        start,
                        self.lifecycle.new_empty_bucket(time_ms),
                    ));
                    let prev = slot.compare_and_swap(
                        &None::<Arc<WindowWrap<L::Bucket>>>,
                        Some(Arc::clone(&fresh)),
                    );
                    if prev.is_none() {
                        return fresh;
                    }
                    // Lost the install race; the winner's window shows up
                    // on the next load.
                    std::thread::yield_now();
                }
                Some(wrap) if wrap.start_ms() == start => {
                    return wrap;
                }
                Some(wrap) if wrap.start_ms() < start => {
                    if let Some(_guard) = self.reset_lock.try_lock() {
                        self.lifecycle.reset_window(&wrap, start);
                        return wrap;
                    }
                    std::thread::yield_now();
                }
                Some(_) => {
                    // Clock skew: don't install, just count somewhere.
                    return Arc::new(WindowWrap::new(
                        self.window_length_ms,
                        start,
                        self.lifecycle.new_empty_bucket(time_ms),
                    ));
                }
            }
        }
    } // end method current_window

    /// The window covering `time_ms − window_length`, if still live.
    pub(crate) fn previous_window(
        &self,
        time_ms: u64,
    ) -> Option<Arc<WindowWrap<L::Bucket>>> {
        let target = time_ms.checked_sub(self.window_length_ms)?;
        let wrap = self.slots[self.slot_index(target)].load_full()?;
        if self.lifecycle.is_stale(time_ms, &wrap, self.interval_ms) || !wrap.contains(target) {
            return None;
        }
        Some(wrap)
    }

    /// The window whose slice contains `time_ms`, regardless of staleness
    /// relative to now. Used to read scheduled future buckets and to peek
    /// at a specific historic slice.
    pub(crate) fn window_value(&self, time_ms: u64) -> Option<Arc<WindowWrap<L::Bucket>>> {
        let wrap = self.slots[self.slot_index(time_ms)].load_full()?;
        wrap.contains(time_ms).then_some(wrap)
    }

    /// All windows still inside the horizon at `time_ms`. Ordering is not
    /// meaningful.
    pub(crate) fn live_windows(&self, time_ms: u64) -> Vec<Arc<WindowWrap<L::Bucket>>> {
        let mut result = Vec::with_capacity(self.sample_count);
        for slot in &self.slots {
            if let Some(wrap) = slot.load_full()
                && !self.lifecycle.is_stale(time_ms, &wrap, self.interval_ms)
            {
                result.push(wrap);
            }
        }
        result
    }
}
