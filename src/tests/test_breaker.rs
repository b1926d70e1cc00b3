use std::sync::Arc;

use parking_lot::Mutex;

use crate::breaker::{
    BreakerState, CircuitBreaker, DegradeGrade, DegradeRule, ExceptionCircuitBreaker,
    ObserverRegistry, SlowRequestCircuitBreaker, StateChangeObserver,
};
use crate::engine::{Entry, TrafficType};
use crate::error::BlockError;
use crate::flow::FlowRule;
use crate::topo::{ClusterNode, DefaultNode};
use crate::CoreConfig;

fn entry_at(create_ms: u64) -> Entry {
    let config = CoreConfig::default();
    let cluster = Arc::new(ClusterNode::new("res", &config));
    let node = Arc::new(DefaultNode::new("ctx", "res", cluster, &config));
    Entry::new("res", TrafficType::Inbound, 1, create_ms, node, None)
}

fn completed_entry(create_ms: u64, complete_ms: u64, failed: bool) -> Entry {
    let mut entry = entry_at(create_ms);
    entry.set_complete(complete_ms);
    if failed {
        entry.record_error("boom");
    }
    entry
}

fn error_count_rule(count: f64, time_window_s: u32) -> DegradeRule {
    DegradeRule {
        resource: "res".into(),
        grade: DegradeGrade::ExceptionCount,
        count,
        time_window_s,
        min_request_amount: 1,
        stat_interval_ms: 500,
        ..DegradeRule::default()
    }
}

fn exception_breaker(rule: DegradeRule) -> ExceptionCircuitBreaker {
    ExceptionCircuitBreaker::new(Arc::new(rule), Arc::new(ObserverRegistry::new()))
}

#[test]
fn error_count_breaker_opens_and_recovers() {
    let breaker = exception_breaker(error_count_rule(0.0, 30));
    assert_eq!(breaker.state(), BreakerState::Closed);

    // One failure exceeds a zero threshold.
    breaker.on_request_complete(&completed_entry(0, 10, true), 10);
    assert_eq!(breaker.state(), BreakerState::Open);

    // Five seconds later, still short-circuiting.
    let mut probe = entry_at(5_000);
    assert!(!breaker.try_pass(&mut probe, 5_000));
    assert_eq!(breaker.state(), BreakerState::Open);

    // Recovery timeout reached: exactly one probe goes through.
    let mut probe = entry_at(30_010);
    assert!(breaker.try_pass(&mut probe, 30_010));
    assert_eq!(breaker.state(), BreakerState::HalfOpen);

    let mut second_probe = entry_at(30_020);
    assert!(!breaker.try_pass(&mut second_probe, 30_020));

    // The probe succeeds: closed again, statistics reset.
    breaker.on_request_complete(&completed_entry(30_010, 30_040, false), 30_040);
    assert_eq!(breaker.state(), BreakerState::Closed);
}

#[test]
fn failed_probe_reopens_the_breaker() {
    let breaker = exception_breaker(error_count_rule(0.0, 30));

    breaker.on_request_complete(&completed_entry(0, 10, true), 10);
    let mut probe = entry_at(30_010);
    assert!(breaker.try_pass(&mut probe, 30_010));

    breaker.on_request_complete(&completed_entry(30_010, 30_040, true), 30_040);
    assert_eq!(breaker.state(), BreakerState::Open);

    // The retry deadline moved forward: no new probe right away.
    let mut probe = entry_at(30_050);
    assert!(!breaker.try_pass(&mut probe, 30_050));
    let mut probe = entry_at(60_050);
    assert!(breaker.try_pass(&mut probe, 60_050));
}

#[test]
fn blocked_probe_falls_back_to_open_via_the_terminate_hook() {
    let breaker = exception_breaker(error_count_rule(0.0, 30));

    breaker.on_request_complete(&completed_entry(0, 10, true), 10);

    let mut probe = entry_at(30_010);
    assert!(breaker.try_pass(&mut probe, 30_010));
    assert_eq!(breaker.state(), BreakerState::HalfOpen);

    // The probe never reaches the protected call: a downstream rule blocks
    // it. Terminating with a block error must re-open the breaker.
    probe.set_block_error(BlockError::Flow {
        rule: Arc::new(FlowRule {
            resource: "res".into(),
            ..FlowRule::default()
        }),
    });
    probe.run_terminate_hooks(30_020);
    assert_eq!(breaker.state(), BreakerState::Open);

    // And the retry deadline was re-armed from the hook's timestamp.
    let mut probe = entry_at(30_030);
    assert!(!breaker.try_pass(&mut probe, 30_030));
    let mut probe = entry_at(60_020);
    assert!(breaker.try_pass(&mut probe, 60_020));
}

#[test]
fn clean_termination_leaves_the_probe_state_alone() {
    let breaker = exception_breaker(error_count_rule(0.0, 30));

    breaker.on_request_complete(&completed_entry(0, 10, true), 10);
    let mut probe = entry_at(30_010);
    assert!(breaker.try_pass(&mut probe, 30_010));

    // No block error: the hook is a no-op and the probe stays in flight.
    probe.run_terminate_hooks(30_020);
    assert_eq!(breaker.state(), BreakerState::HalfOpen);
}

#[test]
fn error_count_respects_min_request_amount() {
    let rule = DegradeRule {
        min_request_amount: 5,
        ..error_count_rule(0.0, 30)
    };
    let breaker = exception_breaker(rule);

    for i in 0..4 {
        breaker.on_request_complete(&completed_entry(0, 10, true), 10 + i);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
    breaker.on_request_complete(&completed_entry(0, 10, true), 20);
    assert_eq!(breaker.state(), BreakerState::Open);
}

#[test]
fn error_ratio_breaker_trips_on_the_ratio() {
    let rule = DegradeRule {
        resource: "res".into(),
        grade: DegradeGrade::ExceptionRatio,
        count: 0.5,
        time_window_s: 10,
        min_request_amount: 4,
        stat_interval_ms: 1_000,
        ..DegradeRule::default()
    };
    let breaker = exception_breaker(rule);

    // 2 failures out of 4 is exactly 0.5, not above it.
    breaker.on_request_complete(&completed_entry(0, 5, true), 5);
    breaker.on_request_complete(&completed_entry(0, 5, false), 6);
    breaker.on_request_complete(&completed_entry(0, 5, false), 7);
    breaker.on_request_complete(&completed_entry(0, 5, true), 8);
    assert_eq!(breaker.state(), BreakerState::Closed);

    // One more failure pushes the ratio over the threshold.
    breaker.on_request_complete(&completed_entry(0, 5, true), 9);
    assert_eq!(breaker.state(), BreakerState::Open);
}

#[test]
fn stat_reset_on_close_forgets_old_errors() {
    let breaker = exception_breaker(error_count_rule(1.0, 30));

    // Two failures in the window trip a threshold of one.
    breaker.on_request_complete(&completed_entry(0, 5, true), 5);
    assert_eq!(breaker.state(), BreakerState::Closed);
    breaker.on_request_complete(&completed_entry(0, 6, true), 6);
    assert_eq!(breaker.state(), BreakerState::Open);

    // Recover through a successful probe.
    let mut probe = entry_at(30_010);
    assert!(breaker.try_pass(&mut probe, 30_010));
    breaker.on_request_complete(&completed_entry(30_010, 30_020, false), 30_020);
    assert_eq!(breaker.state(), BreakerState::Closed);

    // Old errors were wiped with the reset: one new failure is not enough.
    breaker.on_request_complete(&completed_entry(30_020, 30_030, true), 30_030);
    assert_eq!(breaker.state(), BreakerState::Closed);
}

#[test]
fn slow_ratio_breaker_trips_on_slow_calls() {
    let rule = DegradeRule {
        resource: "res".into(),
        grade: DegradeGrade::SlowRatio,
        // Calls slower than 100 ms count as slow.
        count: 100.0,
        slow_ratio_threshold: 0.5,
        time_window_s: 10,
        min_request_amount: 2,
        stat_interval_ms: 1_000,
        ..DegradeRule::default()
    };
    let breaker =
        SlowRequestCircuitBreaker::new(Arc::new(rule), Arc::new(ObserverRegistry::new()));

    breaker.on_request_complete(&completed_entry(0, 50, false), 50);
    assert_eq!(breaker.state(), BreakerState::Closed);

    // Two slow calls out of three: ratio 0.66 above 0.5.
    breaker.on_request_complete(&completed_entry(0, 300, false), 300);
    breaker.on_request_complete(&completed_entry(0, 400, false), 400);
    assert_eq!(breaker.state(), BreakerState::Open);

    // A fast probe closes it again.
    let mut probe = entry_at(10_500);
    assert!(breaker.try_pass(&mut probe, 10_500));
    breaker.on_request_complete(&completed_entry(10_500, 10_520, false), 10_520);
    assert_eq!(breaker.state(), BreakerState::Closed);
}

#[test]
fn slow_probe_reopens_the_breaker() {
    let rule = DegradeRule {
        resource: "res".into(),
        grade: DegradeGrade::SlowRatio,
        count: 100.0,
        slow_ratio_threshold: 0.0,
        time_window_s: 10,
        min_request_amount: 1,
        stat_interval_ms: 1_000,
        ..DegradeRule::default()
    };
    let breaker =
        SlowRequestCircuitBreaker::new(Arc::new(rule), Arc::new(ObserverRegistry::new()));

    breaker.on_request_complete(&completed_entry(0, 500, false), 500);
    assert_eq!(breaker.state(), BreakerState::Open);

    let mut probe = entry_at(10_500);
    assert!(breaker.try_pass(&mut probe, 10_500));
    breaker.on_request_complete(&completed_entry(10_500, 11_000, false), 11_000);
    assert_eq!(breaker.state(), BreakerState::Open);
}

struct RecordingObserver {
    transitions: Arc<Mutex<Vec<(BreakerState, BreakerState, Option<f64>)>>>,
}

impl StateChangeObserver for RecordingObserver {
    fn on_state_change(
        &self,
        prev: BreakerState,
        next: BreakerState,
        _rule: &DegradeRule,
        snapshot: Option<f64>,
    ) {
        self.transitions.lock().push((prev, next, snapshot));
    }
}

#[test]
fn observers_see_every_transition_in_order() {
    let transitions = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ObserverRegistry::new();
    registry.register(Box::new(RecordingObserver {
        transitions: Arc::clone(&transitions),
    }));

    let breaker =
        ExceptionCircuitBreaker::new(Arc::new(error_count_rule(0.0, 30)), Arc::new(registry));

    breaker.on_request_complete(&completed_entry(0, 10, true), 10);
    let mut probe = entry_at(30_010);
    assert!(breaker.try_pass(&mut probe, 30_010));
    breaker.on_request_complete(&completed_entry(30_010, 30_020, false), 30_020);

    let seen = transitions.lock();
    assert_eq!(
        seen.as_slice(),
        &[
            (BreakerState::Closed, BreakerState::Open, Some(1.0)),
            (BreakerState::Open, BreakerState::HalfOpen, None),
            (BreakerState::HalfOpen, BreakerState::Closed, None),
        ]
    );
}
