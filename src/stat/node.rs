use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::config::CoreConfig;
use crate::stat::bucket::MetricEvent;
use crate::stat::metric::{MetricSnapshot, SlidingMetric};

/// Real-time statistics for one node of the invocation topology.
///
/// Keeps three kinds of live data:
/// - a sub-second sliding window (borrow ring enabled) answering the QPS
///   and response-time queries admission decisions are made from
/// - a one-minute window (60 buckets of one second) feeding
///   [`metrics`](StatisticNode::metrics) and the per-minute totals
/// - the number of threads currently inside the protected resource
///
/// All operations take the caller's `now_ms`; the node itself never reads
/// a clock. Writes are cheap relaxed atomics on the current bucket, reads
/// sum the live buckets of the relevant ring.
pub struct StatisticNode {
    second: SlidingMetric,
    minute: SlidingMetric,
    cur_threads: AtomicI64,
    /// Start of the newest bucket already fetched; -1 before any fetch.
    last_fetch_ms: AtomicI64,
}

impl StatisticNode {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            second: SlidingMetric::new(
                config.sample_count,
                config.interval_ms,
                config.statistic_max_rt_ms,
                true,
            ),
            minute: SlidingMetric::new(60, 60_000, config.statistic_max_rt_ms, false),
            cur_threads: AtomicI64::new(0),
            last_fetch_ms: AtomicI64::new(-1),
        }
    } // end constructor

    // ---- reads over the sub-second window ----

    pub fn pass_qps(&self, now_ms: u64) -> f64 {
        self.second.sum(now_ms, MetricEvent::Pass) as f64 / self.second.interval_seconds()
    }

    pub fn block_qps(&self, now_ms: u64) -> f64 {
        self.second.sum(now_ms, MetricEvent::Block) as f64 / self.second.interval_seconds()
    }

    pub fn success_qps(&self, now_ms: u64) -> f64 {
        self.second.sum(now_ms, MetricEvent::Success) as f64 / self.second.interval_seconds()
    }

    pub fn exception_qps(&self, now_ms: u64) -> f64 {
        self.second.sum(now_ms, MetricEvent::Exception) as f64 / self.second.interval_seconds()
    }

    pub fn occupied_pass_qps(&self, now_ms: u64) -> f64 {
        self.second.sum(now_ms, MetricEvent::OccupiedPass) as f64
            / self.second.interval_seconds()
    }

    pub fn total_qps(&self, now_ms: u64) -> f64 {
        self.pass_qps(now_ms) + self.block_qps(now_ms)
    }

    /// Average response time over successful completions in the window.
    pub fn avg_rt(&self, now_ms: u64) -> f64 {
        let rt_sum = self.second.sum(now_ms, MetricEvent::Rt);
        let success = self.second.sum(now_ms, MetricEvent::Success);
        rt_sum as f64 / success.max(1) as f64
    }

    pub fn min_rt(&self, now_ms: u64) -> u64 {
        self.second.min_rt(now_ms)
    }

    /// Peak single-bucket success count, scaled to a per-second rate.
    pub fn max_success_qps(&self, now_ms: u64) -> f64 {
        self.second.max_success(now_ms) as f64 * self.second.sample_count() as f64
            / self.second.interval_seconds()
    }

    // ---- reads over the one-minute window ----

    pub fn total_request(&self, now_ms: u64) -> u64 {
        self.minute.sum(now_ms, MetricEvent::Pass) + self.minute.sum(now_ms, MetricEvent::Block)
    }

    pub fn total_pass(&self, now_ms: u64) -> u64 {
        self.minute.sum(now_ms, MetricEvent::Pass)
    }

    pub fn total_success(&self, now_ms: u64) -> u64 {
        self.minute.sum(now_ms, MetricEvent::Success)
    }

    pub fn total_exception(&self, now_ms: u64) -> u64 {
        self.minute.sum(now_ms, MetricEvent::Exception)
    }

    pub fn block_request(&self, now_ms: u64) -> u64 {
        self.minute.sum(now_ms, MetricEvent::Block)
    }

    /// Pass count of the previous one-second bucket.
    pub fn previous_pass_qps(&self, now_ms: u64) -> f64 {
        self.minute.previous_window_pass(now_ms) as f64
    }

    /// Block count of the previous one-second bucket.
    pub fn previous_block_qps(&self, now_ms: u64) -> f64 {
        self.minute.previous_window_block(now_ms) as f64
    }

    // ---- thread counter ----

    pub fn cur_thread_num(&self) -> u32 {
        self.cur_threads.load(Ordering::Relaxed).max(0) as u32
    }

    pub fn inc_thread(&self) {
        self.cur_threads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_thread(&self) {
        self.cur_threads.fetch_sub(1, Ordering::Relaxed);
    }

    // ---- writes ----

    pub fn add_pass(&self, now_ms: u64, count: u32) {
        self.second.add(now_ms, MetricEvent::Pass, count as u64);
        self.minute.add(now_ms, MetricEvent::Pass, count as u64);
    }

    pub fn add_rt_and_success(&self, now_ms: u64, rt_ms: u64, count: u32) {
        self.second.add(now_ms, MetricEvent::Success, count as u64);
        self.second.add_rt(now_ms, rt_ms);
        self.minute.add(now_ms, MetricEvent::Success, count as u64);
        self.minute.add_rt(now_ms, rt_ms);
    }

    pub fn add_block(&self, now_ms: u64, count: u32) {
        self.second.add(now_ms, MetricEvent::Block, count as u64);
        self.minute.add(now_ms, MetricEvent::Block, count as u64);
    }

    pub fn add_exception(&self, now_ms: u64, count: u32) {
        self.second.add(now_ms, MetricEvent::Exception, count as u64);
        self.minute.add(now_ms, MetricEvent::Exception, count as u64);
    }

    // ---- metrics export ----

    /// Per-second snapshots not yet fetched, keyed by bucket start.
    ///
    /// Returns buckets newer than the last fetch and older than the current
    /// second that carry at least one nonzero counter, then advances the
    /// fetch watermark. Callers must serialize `metrics` calls per node;
    /// concurrent fetchers may observe duplicate or missing buckets.
    pub fn metrics(&self, now_ms: u64) -> BTreeMap<u64, MetricSnapshot> {
        let current_second = now_ms - now_ms % 1000;
        let last_fetch = self.last_fetch_ms.load(Ordering::Relaxed);
        let mut new_last_fetch = last_fetch;
        let mut result = BTreeMap::new();

        for snapshot in self.minute.details(now_ms) {
            if snapshot.timestamp_ms as i64 > last_fetch
                && snapshot.timestamp_ms < current_second
                && snapshot.has_data()
            {
                new_last_fetch = new_last_fetch.max(snapshot.timestamp_ms as i64);
                result.insert(snapshot.timestamp_ms, snapshot);
            }
        }
        self.last_fetch_ms.store(new_last_fetch, Ordering::Relaxed);

        result
    } // end method metrics

    // ---- priority occupancy ----

    /// Milliseconds a prioritized request must wait until `acquire` more
    /// passes fit under `threshold`, or `occupy_timeout_ms` when no bucket
    /// inside the budget frees enough capacity.
    ///
    /// Walks the buckets of the sub-second ring oldest-first: once the
    /// bucket covering `earliest` falls out of the horizon its pass count
    /// is returned to the budget, so the wait for that candidate is the
    /// time until the ring advances past it.
    ///
    /// The pass sum read here may lag the true value, so slightly more
    /// requests than `threshold` can be admitted under high concurrency.
    /// That imprecision is bounded by one bucket width and is accepted.
    pub fn try_occupy_next(
        &self,
        now_ms: u64,
        acquire: u32,
        threshold: f64,
        occupy_timeout_ms: u64,
    ) -> u64 {
        let interval_ms = self.second.interval_ms() as i64;
        let max_count = threshold * interval_ms as f64 / 1000.0;

        let current_borrow = self.second.waiting(now_ms) as f64;
        if current_borrow >= max_count {
            return occupy_timeout_ms;
        }

        let window_length = self.second.window_length_ms() as i64;
        let now = now_ms as i64;
        let mut earliest = now - now % window_length + window_length - interval_ms;
        let mut idx: i64 = 0;
        let mut current_pass = self.second.sum(now_ms, MetricEvent::Pass) as f64;

        while earliest < now {
            let wait = (idx * window_length + window_length - now % window_length) as u64;
            if wait >= occupy_timeout_ms {
                break;
            }
            let window_pass = if earliest >= 0 {
                self.second.pass_in_window(earliest as u64) as f64
            } else {
                0.0
            };
            if current_pass + current_borrow + acquire as f64 - window_pass <= max_count {
                return wait;
            }
            earliest += window_length;
            current_pass -= window_pass;
            idx += 1;
        }

        occupy_timeout_ms
    } // end method try_occupy_next

    /// Schedule `count` passes into the future bucket covering `future_ms`.
    pub fn add_waiting_request(&self, future_ms: u64, count: u32) {
        self.second.add_waiting(future_ms, count as u64);
    }

    /// Book passes granted by a priority wait. They hit the minute ring
    /// immediately; the sub-second ring picks them up when the borrowed
    /// bucket materialises.
    pub fn add_occupied_pass(&self, now_ms: u64, count: u32) {
        self.minute
            .add(now_ms, MetricEvent::OccupiedPass, count as u64);
        self.minute.add(now_ms, MetricEvent::Pass, count as u64);
    }

    /// Passes currently scheduled into future buckets.
    pub fn waiting(&self, now_ms: u64) -> u64 {
        self.second.waiting(now_ms)
    }
}
