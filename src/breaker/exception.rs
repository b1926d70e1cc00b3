use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::breaker::counters::{ErrorCounter, ErrorCounterLifecycle};
use crate::breaker::{
    BreakerShared, BreakerState, CircuitBreaker, DegradeGrade, DegradeRule, ObserverRegistry,
    try_pass_shared,
};
use crate::engine::Entry;
use crate::stat::LeapArray;

/// Breaker tripped by failed completions, as an absolute count or a ratio
/// of the window total.
pub struct ExceptionCircuitBreaker {
    shared: Arc<BreakerShared>,
    stat: LeapArray<ErrorCounterLifecycle>,
    threshold: f64,
    min_request_amount: u64,
    grade: DegradeGrade,
}

impl ExceptionCircuitBreaker {
    /// `rule` must already be validated and carry an exception grade.
    pub(crate) fn new(rule: Arc<DegradeRule>, observers: Arc<ObserverRegistry>) -> Self {
        debug_assert!(matches!(
            rule.grade,
            DegradeGrade::ExceptionCount | DegradeGrade::ExceptionRatio
        ));
        Self {
            threshold: rule.count,
            min_request_amount: rule.min_request_amount,
            grade: rule.grade,
            stat: LeapArray::new(1, rule.stat_interval_ms, ErrorCounterLifecycle),
            shared: Arc::new(BreakerShared::new(rule, observers)),
        }
    } // end constructor

    fn reset_stat(&self, now_ms: u64) {
        // Single-bucket ring; zeroing the current bucket clears the window.
        self.stat.current_window(now_ms).value().reset();
    }

    fn handle_completion(&self, failed: bool, now_ms: u64) {
        match self.shared.state() {
            BreakerState::Open => {}
            BreakerState::HalfOpen => {
                // The probe's own outcome decides.
                if failed {
                    self.shared.from_half_open_to_open(now_ms, 1.0);
                } else if self.shared.from_half_open_to_closed() {
                    self.reset_stat(now_ms);
                }
            }
            BreakerState::Closed => {
                let mut errors = 0u64;
                let mut total = 0u64;
                for window in self.stat.live_windows(now_ms) {
                    let counter: &ErrorCounter = window.value();
                    errors += counter.error_count.load(Ordering::Relaxed);
                    total += counter.total_count.load(Ordering::Relaxed);
                }
                if total < self.min_request_amount {
                    return;
                }
                let metric = if self.grade == DegradeGrade::ExceptionRatio {
                    errors as f64 / total as f64
                } else {
                    errors as f64
                };
                if metric > self.threshold {
                    self.shared.transform_to_open(now_ms, metric);
                }
            }
        }
    } // end method handle_completion
}

impl CircuitBreaker for ExceptionCircuitBreaker {
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
        let failed = entry.has_error();
        let window = self.stat.current_window(now_ms);
        let counter = window.value();
        if failed {
            counter.error_count.fetch_add(1, Ordering::Relaxed);
        }
        counter.total_count.fetch_add(1, Ordering::Relaxed);

        self.handle_completion(failed, now_ms);
    }
}
