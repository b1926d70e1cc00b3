use std::sync::Arc;

use crate::stat::bucket::{MetricBucket, MetricEvent};
use crate::stat::leap_array::{LeapArray, RingLifecycle};
use crate::stat::window::WindowWrap;

/// Lifecycle of a regular metric ring.
///
/// When a borrow ring is attached (the occupiable flavour), a slot that is
/// born or recycled for time `t` absorbs the pass count scheduled into the
/// matching future bucket, making borrowed passes visible exactly once.
pub(crate) struct MetricLifecycle {
    borrow: Option<Arc<LeapArray<FutureLifecycle>>>,
    max_rt_ms: u64,
}

impl RingLifecycle for MetricLifecycle {
    type Bucket = MetricBucket;

    fn new_empty_bucket(&self, time_ms: u64) -> MetricBucket {
        let bucket = MetricBucket::new(self.max_rt_ms);
        if let Some(borrow) = &self.borrow
            && let Some(scheduled) = borrow.window_value(time_ms)
        {
            bucket.add(MetricEvent::Pass, scheduled.value().pass());
        }
        bucket
    }

    fn reset_window(&self, wrap: &WindowWrap<MetricBucket>, start_ms: u64) {
        wrap.reset_start(start_ms);
        wrap.value().reset();
        if let Some(borrow) = &self.borrow
            && let Some(scheduled) = borrow.window_value(start_ms)
        {
            wrap.value().add(MetricEvent::Pass, scheduled.value().pass());
        }
    }
}

/// Lifecycle of the future-only borrow ring.
///
/// A scheduled slot is stale the moment its instant arrives: from then on
/// it has been absorbed by the regular ring and must be recycled before
/// new waits are recorded into that slice.
pub(crate) struct FutureLifecycle {
    max_rt_ms: u64,
}

impl RingLifecycle for FutureLifecycle {
    type Bucket = MetricBucket;

    fn new_empty_bucket(&self, _time_ms: u64) -> MetricBucket {
        MetricBucket::new(self.max_rt_ms)
    }

    fn reset_window(&self, wrap: &WindowWrap<MetricBucket>, start_ms: u64) {
        wrap.reset_start(start_ms);
        wrap.value().reset();
    }

    fn is_stale(&self, time_ms: u64, wrap: &WindowWrap<MetricBucket>, _interval_ms: u64) -> bool {
        time_ms >= wrap.start_ms()
    }
}

/// Per-second detail of one bucket of the one-minute ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetricSnapshot {
    /// Bucket start, aligned to the second.
    pub timestamp_ms: u64,
    pub pass: u64,
    pub block: u64,
    pub success: u64,
    pub exception: u64,
    /// Average response time over the bucket, in milliseconds.
    pub rt: u64,
    pub occupied_pass: u64,
}

impl MetricSnapshot {
    fn from_window(wrap: &WindowWrap<MetricBucket>) -> Self {
        let bucket = wrap.value();
        let success = bucket.success();
        let rt_sum = bucket.get(MetricEvent::Rt);
        Self {
            timestamp_ms: wrap.start_ms(),
            pass: bucket.pass(),
            block: bucket.get(MetricEvent::Block),
            success,
            exception: bucket.get(MetricEvent::Exception),
            rt: if success != 0 { rt_sum / success } else { rt_sum },
            occupied_pass: bucket.get(MetricEvent::OccupiedPass),
        }
    }

    /// Whether any counter carries data worth reporting.
    pub(crate) fn has_data(&self) -> bool {
        self.pass > 0
            || self.block > 0
            || self.success > 0
            || self.exception > 0
            || self.rt > 0
            || self.occupied_pass > 0
    }
}

/// Window-spanning accessor over one metric ring.
///
/// Every read first touches `current_window` so stale slots get recycled
/// (and scheduled borrow buckets absorbed) even on an otherwise idle ring.
pub(crate) struct SlidingMetric {
    data: LeapArray<MetricLifecycle>,
    borrow: Option<Arc<LeapArray<FutureLifecycle>>>,
    max_rt_ms: u64,
}

impl SlidingMetric {
    /// `enable_occupy` attaches the future-only borrow ring used by
    /// priority waits.
    pub(crate) fn new(
        sample_count: u32,
        interval_ms: u32,
        max_rt_ms: u64,
        enable_occupy: bool,
    ) -> Self {
        let borrow = enable_occupy.then(|| {
            Arc::new(LeapArray::new(
                sample_count,
                interval_ms,
                FutureLifecycle { max_rt_ms },
            ))
        });
        let data = LeapArray::new(
            sample_count,
            interval_ms,
            MetricLifecycle {
                borrow: borrow.clone(),
                max_rt_ms,
            },
        );
        Self {
            data,
            borrow,
            max_rt_ms,
        }
    } // end constructor

    #[inline]
    pub(crate) fn interval_ms(&self) -> u64 {
        self.data.interval_ms()
    }

    #[inline]
    pub(crate) fn interval_seconds(&self) -> f64 {
        self.data.interval_seconds()
    }

    #[inline]
    pub(crate) fn sample_count(&self) -> u32 {
        self.data.sample_count()
    }

    #[inline]
    pub(crate) fn window_length_ms(&self) -> u64 {
        self.data.window_length_ms()
    }

    pub(crate) fn add(&self, time_ms: u64, event: MetricEvent, count: u64) {
        self.data.current_window(time_ms).value().add(event, count);
    }

    pub(crate) fn add_rt(&self, time_ms: u64, rt_ms: u64) {
        self.data.current_window(time_ms).value().add_rt(rt_ms);
    }

    /// Sum of `event` across all live buckets.
    pub(crate) fn sum(&self, time_ms: u64, event: MetricEvent) -> u64 {
        self.data.current_window(time_ms);
        self.data
            .live_windows(time_ms)
            .iter()
            .map(|w| w.value().get(event))
            .sum()
    }

    /// Largest per-bucket success count across the live window.
    pub(crate) fn max_success(&self, time_ms: u64) -> u64 {
        self.data.current_window(time_ms);
        self.data
            .live_windows(time_ms)
            .iter()
            .map(|w| w.value().success())
            .max()
            .unwrap_or(0)
    }

    /// Smallest recorded response time across the live window, floored to
    /// one millisecond.
    pub(crate) fn min_rt(&self, time_ms: u64) -> u64 {
        self.data.current_window(time_ms);
        self.data
            .live_windows(time_ms)
            .iter()
            .map(|w| w.value().min_rt())
            .min()
            .unwrap_or(self.max_rt_ms)
            .max(1)
    }

    /// Pass count of the bucket whose slice contains `time_ms`, zero when
    /// that slice has already been recycled.
    pub(crate) fn pass_in_window(&self, time_ms: u64) -> u64 {
        self.data
            .window_value(time_ms)
            .map(|w| w.value().pass())
            .unwrap_or(0)
    }

    pub(crate) fn previous_window_pass(&self, time_ms: u64) -> u64 {
        self.data.current_window(time_ms);
        self.data
            .previous_window(time_ms)
            .map(|w| w.value().pass())
            .unwrap_or(0)
    }

    pub(crate) fn previous_window_block(&self, time_ms: u64) -> u64 {
        self.data.current_window(time_ms);
        self.data
            .previous_window(time_ms)
            .map(|w| w.value().get(MetricEvent::Block))
            .unwrap_or(0)
    }

    /// Passes scheduled into future buckets and not yet absorbed.
    pub(crate) fn waiting(&self, time_ms: u64) -> u64 {
        let Some(borrow) = &self.borrow else {
            return 0;
        };
        borrow.current_window(time_ms);
        borrow
            .live_windows(time_ms)
            .iter()
            .map(|w| w.value().pass())
            .sum()
    }

    /// Schedule `count` passes into the future bucket covering `future_ms`.
    pub(crate) fn add_waiting(&self, future_ms: u64, count: u64) {
        debug_assert!(
            self.borrow.is_some(),
            "add_waiting requires an occupiable ring"
        );
        if let Some(borrow) = &self.borrow {
            borrow
                .current_window(future_ms)
                .value()
                .add(MetricEvent::Pass, count);
        }
    }

    /// Per-bucket snapshots across the live window.
    pub(crate) fn details(&self, time_ms: u64) -> Vec<MetricSnapshot> {
        self.data.current_window(time_ms);
        self.data
            .live_windows(time_ms)
            .iter()
            .map(|w| MetricSnapshot::from_window(w))
            .collect()
    }
}
