use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::breaker::counters::{SlowCounter, SlowCounterLifecycle};
use crate::breaker::{
    BreakerShared, BreakerState, CircuitBreaker, DegradeGrade, DegradeRule, ObserverRegistry,
    try_pass_shared,
};
use crate::engine::Entry;
use crate::stat::LeapArray;

/// Breaker tripped by the ratio of slow completions.
///
/// A completion is slow when its response time exceeds the rule's `count`
/// milliseconds; the trip threshold is `slow_ratio_threshold` over the
/// statistics window.
pub struct SlowRequestCircuitBreaker {
    shared: Arc<BreakerShared>,
    stat: LeapArray<SlowCounterLifecycle>,
    max_allowed_rt_ms: u64,
    ratio_threshold: f64,
    min_request_amount: u64,
}

impl SlowRequestCircuitBreaker {
    /// `rule` must already be validated and carry the slow-ratio grade.
    pub(crate) fn new(rule: Arc<DegradeRule>, observers: Arc<ObserverRegistry>) -> Self {
        debug_assert!(matches!(rule.grade, DegradeGrade::SlowRatio));
        Self {
            max_allowed_rt_ms: rule.count as u64,
            ratio_threshold: rule.slow_ratio_threshold,
            min_request_amount: rule.min_request_amount,
            stat: LeapArray::new(1, rule.stat_interval_ms, SlowCounterLifecycle),
            shared: Arc::new(BreakerShared::new(rule, observers)),
        }
    } // end constructor

    fn reset_stat(&self, now_ms: u64) {
        self.stat.current_window(now_ms).value().reset();
    }
}

impl CircuitBreaker for SlowRequestCircuitBreaker {
    fn rule(&self) -> &Arc<DegradeRule> {
        self.shared.rule()
    }

    fn state(&self) -> BreakerState {
        self.shared.state()
    }

    fn try_pass(&self, entry: &mut Entry, now_ms: u64) -> bool {
        try_pass_shared(&self.shared, entry, now_ms)
    }

    fn on_request_complete(&self, entry: &Entry, now_ms: u64) {
        let rt = entry.rt().unwrap_or(0);
        let slow = rt > self.max_allowed_rt_ms;

        let window = self.stat.current_window(now_ms);
        let counter = window.value();
        if slow {
            counter.slow_count.fetch_add(1, Ordering::Relaxed);
        }
        counter.total_count.fetch_add(1, Ordering::Relaxed);

        match self.shared.state() {
            BreakerState::Open => {}
            BreakerState::HalfOpen => {
                // A slow probe is as bad as a failed one.
                if slow {
                    self.shared.from_half_open_to_open(now_ms, 1.0);
                } else if self.shared.from_half_open_to_closed() {
                    self.reset_stat(now_ms);
                }
            }
            BreakerState::Closed => {
                let mut slow_total = 0u64;
                let mut total = 0u64;
                for window in self.stat.live_windows(now_ms) {
                    let counter: &SlowCounter = window.value();
                    slow_total += counter.slow_count.load(Ordering::Relaxed);
                    total += counter.total_count.load(Ordering::Relaxed);
                }
                if total < self.min_request_amount {
                    return;
                }
                let ratio = slow_total as f64 / total as f64;
                if ratio > self.ratio_threshold {
                    self.shared.transform_to_open(now_ms, ratio);
                }
            }
        }
    } // end method on_request_complete
}
