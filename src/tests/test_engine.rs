use std::sync::Arc;
use std::thread;

use crate::breaker::{BreakerState, DegradeGrade, DegradeRule};
use crate::error::BlockError;
use crate::flow::{FlowGrade, FlowRule};
use crate::{CoreConfig, Engine, TrafficType};

fn engine() -> Engine {
    Engine::new(CoreConfig::default()).unwrap()
}

fn qps_rule(resource: &str, count: f64) -> FlowRule {
    FlowRule {
        resource: resource.into(),
        grade: FlowGrade::Qps,
        count,
        ..FlowRule::default()
    }
}

fn error_count_rule(resource: &str, time_window_s: u32) -> DegradeRule {
    DegradeRule {
        resource: resource.into(),
        grade: DegradeGrade::ExceptionCount,
        count: 0.0,
        time_window_s,
        min_request_amount: 1,
        stat_interval_ms: 500,
        ..DegradeRule::default()
    }
}

#[test]
fn qps_limit_blocks_the_third_arrival() {
    let engine = engine();
    engine.load_flow_rules(vec![qps_rule("res", 2.0)]).unwrap();

    let mut ctx = engine.context("web", "");

    let first = engine.enter(&mut ctx, "res", TrafficType::Inbound, 1, false);
    let second = engine.enter(&mut ctx, "res", TrafficType::Inbound, 1, false);
    let third = engine.enter(&mut ctx, "res", TrafficType::Inbound, 1, false);

    let second = second.expect("second arrival should pass");
    let first = first.expect("first arrival should pass");
    assert!(matches!(third, Err(BlockError::Flow { .. })));

    engine.exit(&mut ctx, second);
    engine.exit(&mut ctx, first);

    // After the window rolls over the resource opens up again.
    engine.clock().advance_ms(1_100);
    let fourth = engine
        .enter(&mut ctx, "res", TrafficType::Inbound, 1, false)
        .expect("should pass in the fresh window");
    engine.exit(&mut ctx, fourth);
}

#[test]
fn blocks_are_booked_on_node_origin_and_global() {
    let engine = engine();
    engine.load_flow_rules(vec![qps_rule("res", 0.0)]).unwrap();

    let mut ctx = engine.context("web", "caller_a");
    let blocked = engine.enter(&mut ctx, "res", TrafficType::Inbound, 1, false);
    assert!(blocked.is_err());

    let now = engine.clock().now_ms();
    let cluster = engine.cluster_node("res").unwrap();
    assert_eq!(cluster.stats().block_request(now), 1);
    assert_eq!(cluster.origin_node("caller_a").block_request(now), 1);
    assert_eq!(engine.global_inbound_node().stats().block_request(now), 1);
    // Nothing passed.
    assert_eq!(cluster.stats().total_pass(now), 0);
}

#[test]
fn thread_limit_releases_on_exit() {
    let engine = engine();
    engine
        .load_flow_rules(vec![FlowRule {
            grade: FlowGrade::Thread,
            count: 1.0,
            ..qps_rule("res", 0.0)
        }])
        .unwrap();

    let mut ctx_a = engine.context("web", "");
    let entry_a = engine
        .enter(&mut ctx_a, "res", TrafficType::Inbound, 1, false)
        .expect("first thread should enter");

    // A second caller is held back while the first is inside.
    let mut ctx_b = engine.context("web", "");
    let blocked = engine.enter(&mut ctx_b, "res", TrafficType::Inbound, 1, false);
    assert!(matches!(blocked, Err(BlockError::Flow { .. })));

    engine.exit(&mut ctx_a, entry_a);

    let entry_b = engine
        .enter(&mut ctx_b, "res", TrafficType::Inbound, 1, false)
        .expect("slot freed after exit");
    engine.exit(&mut ctx_b, entry_b);
}

#[test]
fn exit_records_rt_success_and_exceptions() {
    let engine = engine();
    let mut ctx = engine.context("web", "caller_a");

    let entry = engine
        .enter(&mut ctx, "res", TrafficType::Inbound, 1, false)
        .unwrap();
    engine.clock().advance_ms(40);
    engine.exit(&mut ctx, entry);

    let mut failing = engine
        .enter(&mut ctx, "res", TrafficType::Inbound, 1, false)
        .unwrap();
    failing.record_error("downstream failure");
    engine.exit(&mut ctx, failing);

    let now = engine.clock().now_ms();
    let cluster = engine.cluster_node("res").unwrap();
    let stats = cluster.stats();
    assert_eq!(stats.total_pass(now), 2);
    assert_eq!(stats.total_success(now), 2);
    assert_eq!(stats.total_exception(now), 1);
    assert!(stats.avg_rt(now) >= 20.0);
    assert_eq!(stats.cur_thread_num(), 0);

    // The origin aggregate saw the same completions.
    assert_eq!(cluster.origin_node("caller_a").total_success(now), 2);
    assert_eq!(
        engine.global_inbound_node().stats().total_exception(now),
        1
    );
}

#[test]
fn outbound_traffic_skips_the_global_inbound_node() {
    let engine = engine();
    let mut ctx = engine.context("job", "");

    let entry = engine
        .enter(&mut ctx, "res", TrafficType::Outbound, 1, false)
        .unwrap();
    engine.exit(&mut ctx, entry);

    let now = engine.clock().now_ms();
    assert_eq!(engine.global_inbound_node().stats().total_request(now), 0);
}

#[test]
fn nested_entries_build_the_invocation_tree() {
    let engine = engine();
    let mut ctx = engine.context("web", "");

    let outer = engine
        .enter(&mut ctx, "handler", TrafficType::Inbound, 1, false)
        .unwrap();
    let inner = engine
        .enter(&mut ctx, "repository", TrafficType::Outbound, 1, false)
        .unwrap();

    engine.exit(&mut ctx, inner);
    engine.exit(&mut ctx, outer);

    let entrance = engine.entrance_node("web");
    let roots = entrance.children();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].resource(), "handler");

    let nested = roots[0].children();
    assert_eq!(nested.len(), 1);
    assert_eq!(nested[0].resource(), "repository");
}

#[test]
fn entrance_node_aggregates_first_level_traffic() {
    let engine = engine();
    let mut ctx = engine.context("web", "");

    for _ in 0..3 {
        let entry = engine
            .enter(&mut ctx, "res", TrafficType::Inbound, 1, false)
            .unwrap();
        engine.exit(&mut ctx, entry);
    }

    let now = engine.clock().now_ms();
    assert_eq!(engine.entrance_node("web").total_pass(now), 3);
}

#[test]
fn breaker_opens_after_failure_and_recovers_after_the_window() {
    let engine = engine();
    engine
        .load_degrade_rules(vec![error_count_rule("res", 30)])
        .unwrap();

    let mut ctx = engine.context("web", "");

    let mut failing = engine
        .enter(&mut ctx, "res", TrafficType::Inbound, 1, false)
        .unwrap();
    failing.record_error("boom");
    engine.exit(&mut ctx, failing);

    let breakers = engine.circuit_breakers("res");
    assert_eq!(breakers.len(), 1);
    assert_eq!(breakers[0].state(), BreakerState::Open);

    // Five seconds in: still short-circuiting, booked as a degrade block.
    engine.clock().advance_ms(5_000);
    let blocked = engine.enter(&mut ctx, "res", TrafficType::Inbound, 1, false);
    assert!(matches!(blocked, Err(BlockError::Degrade { .. })));

    // Past the recovery window: one probe is admitted and closes it.
    engine.clock().advance_ms(26_000);
    let probe = engine
        .enter(&mut ctx, "res", TrafficType::Inbound, 1, false)
        .expect("probe should be admitted in half-open");
    assert_eq!(breakers[0].state(), BreakerState::HalfOpen);
    engine.exit(&mut ctx, probe);
    assert_eq!(breakers[0].state(), BreakerState::Closed);
}

#[test]
fn probe_blocked_by_a_downstream_rule_reopens_the_breaker() {
    let engine = engine();
    engine
        .load_degrade_rules(vec![
            error_count_rule("res", 1),
            // Second breaker recovers much later, so it still rejects when
            // the first one is probing.
            error_count_rule("res", 60),
        ])
        .unwrap();

    let mut ctx = engine.context("web", "");

    let mut failing = engine
        .enter(&mut ctx, "res", TrafficType::Inbound, 1, false)
        .unwrap();
    failing.record_error("boom");
    engine.exit(&mut ctx, failing);

    let breakers = engine.circuit_breakers("res");
    assert!(breakers.iter().all(|b| b.state() == BreakerState::Open));

    // The first breaker is ready to probe; the second still blocks. The
    // probe terminates blocked, so the first falls straight back to open.
    engine.clock().advance_ms(1_500);
    let blocked = engine.enter(&mut ctx, "res", TrafficType::Inbound, 1, false);
    assert!(matches!(blocked, Err(BlockError::Degrade { .. })));
    assert_eq!(breakers[0].state(), BreakerState::Open);
    assert_eq!(breakers[1].state(), BreakerState::Open);
}

#[test]
fn metrics_drain_once_per_bucket() {
    let engine = engine();
    let mut ctx = engine.context("web", "");

    let entry = engine
        .enter(&mut ctx, "res", TrafficType::Inbound, 1, false)
        .unwrap();
    engine.exit(&mut ctx, entry);

    // Let the active second complete before fetching.
    engine.clock().advance_ms(2_100);

    let fetched = engine.metrics("res");
    assert_eq!(fetched.len(), 1);
    let snapshot = fetched.values().next().unwrap();
    assert_eq!(snapshot.pass, 1);
    assert_eq!(snapshot.success, 1);

    assert!(engine.metrics("res").is_empty());
    assert!(engine.metrics("unknown").is_empty());
}

#[test]
fn concurrent_admission_respects_the_threshold_loosely() {
    let engine = Arc::new(engine());
    engine.load_flow_rules(vec![qps_rule("res", 50.0)]).unwrap();

    let mut passed = Vec::new();
    let threads: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut local_passed = 0u32;
                let mut ctx = engine.context("web", "");
                for _ in 0..100 {
                    match engine.enter(&mut ctx, "res", TrafficType::Inbound, 1, false) {
                        Ok(entry) => {
                            local_passed += 1;
                            engine.exit(&mut ctx, entry);
                        }
                        Err(_) => {}
                    }
                }
                local_passed
            })
        })
        .collect();

    for t in threads {
        passed.push(t.join().expect("thread panicked"));
    }

    let total: u32 = passed.iter().sum();
    // Admission is best-effort under concurrency: the documented bound is
    // the threshold plus the in-flight overshoot, never the full load.
    assert!(total >= 50);
    assert!(total < 400);

    let now = engine.clock().now_ms();
    let cluster = engine.cluster_node("res").unwrap();
    assert_eq!(
        cluster.stats().total_request(now),
        800,
        "every arrival is accounted as pass or block"
    );
}
