use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::BlockError;
use crate::flow::cluster::{TokenResult, TokenService};
use crate::flow::controller::{AdmitOutcome, can_pass};
use crate::flow::rule::{FlowRule, FlowStrategy};
use crate::flow::{LIMIT_APP_DEFAULT, LIMIT_APP_OTHER};
use crate::sleep::WaitGate;
use crate::stat::StatisticNode;
use crate::topo::{DefaultNode, NodeRegistry};

/// Result of running every flow rule of a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FlowOutcome {
    Pass,
    /// One rule granted a priority wait; remaining rules are skipped and
    /// the caller parks for this many milliseconds before admission.
    PriorityWait(u64),
}

/// Run `rules` in order. The first rejection blocks the call; the first
/// priority wait short-circuits the rest.
#[allow(clippy::too_many_arguments)]
pub(crate) fn check_flow(
    rules: &[Arc<FlowRule>],
    registry: &NodeRegistry,
    context_name: &str,
    origin: &str,
    node: &Arc<DefaultNode>,
    acquire: u32,
    prioritized: bool,
    now_ms: u64,
    occupy_timeout_ms: u64,
    token_service: Option<&Arc<dyn TokenService>>,
) -> Result<FlowOutcome, BlockError> {
    for rule in rules {
        let outcome = if rule.cluster_mode {
            cluster_check(
                rule,
                rules,
                registry,
                context_name,
                origin,
                node,
                acquire,
                prioritized,
                now_ms,
                occupy_timeout_ms,
                token_service,
            )
        } else {
            local_check(
                rule,
                rules,
                registry,
                context_name,
                origin,
                node,
                acquire,
                prioritized,
                now_ms,
                occupy_timeout_ms,
            )
        };

        match outcome {
            AdmitOutcome::Pass => {}
            AdmitOutcome::PriorityWait(wait_ms) => {
                return Ok(FlowOutcome::PriorityWait(wait_ms));
            }
            AdmitOutcome::Reject => {
                return Err(BlockError::Flow {
                    rule: Arc::clone(rule),
                });
            }
        }
    }
    Ok(FlowOutcome::Pass)
}

#[allow(clippy::too_many_arguments)]
fn local_check(
    rule: &Arc<FlowRule>,
    all_rules: &[Arc<FlowRule>],
    registry: &NodeRegistry,
    context_name: &str,
    origin: &str,
    node: &Arc<DefaultNode>,
    acquire: u32,
    prioritized: bool,
    now_ms: u64,
    occupy_timeout_ms: u64,
) -> AdmitOutcome {
    let Some(selected) = select_node(rule, all_rules, registry, context_name, origin, node) else {
        // No governed node resolves for this caller; the rule does not
        // apply.
        return AdmitOutcome::Pass;
    };
    can_pass(rule, &selected, acquire, prioritized, now_ms, occupy_timeout_ms)
}

/// An origin that is neither the `default` nor the `other` wildcard.
fn is_concrete_origin(origin: &str) -> bool {
    !origin.is_empty() && origin != LIMIT_APP_DEFAULT && origin != LIMIT_APP_OTHER
}

/// Whether `origin` is governed by an `other` rule: no sibling rule of the
/// resource names it explicitly.
fn is_other_origin(origin: &str, all_rules: &[Arc<FlowRule>]) -> bool {
    if !is_concrete_origin(origin) {
        return false;
    }
    !all_rules.iter().any(|r| r.limit_app == origin)
}

/// Resolve the statistic node the rule governs for this caller, per the
/// (limit app × strategy) table. `None` means the rule does not apply.
fn select_node(
    rule: &FlowRule,
    all_rules: &[Arc<FlowRule>],
    registry: &NodeRegistry,
    context_name: &str,
    origin: &str,
    node: &Arc<DefaultNode>,
) -> Option<Arc<StatisticNode>> {
    if rule.limit_app == origin && is_concrete_origin(origin) {
        if rule.strategy == FlowStrategy::Direct {
            return Some(node.cluster().origin_node(origin));
        }
        return select_reference_node(rule, registry, context_name, node);
    }

    if rule.limit_app == LIMIT_APP_DEFAULT {
        if rule.strategy == FlowStrategy::Direct {
            return Some(Arc::clone(node.cluster().stats()));
        }
        return select_reference_node(rule, registry, context_name, node);
    }

    if rule.limit_app == LIMIT_APP_OTHER && is_other_origin(origin, all_rules) {
        if rule.strategy == FlowStrategy::Direct {
            return Some(node.cluster().origin_node(origin));
        }
        return select_reference_node(rule, registry, context_name, node);
    }

    None
}

fn select_reference_node(
    rule: &FlowRule,
    registry: &NodeRegistry,
    context_name: &str,
    node: &Arc<DefaultNode>,
) -> Option<Arc<StatisticNode>> {
    if rule.ref_resource.is_empty() {
        return None;
    }
    match rule.strategy {
        FlowStrategy::Relate => registry
            .get_cluster_node(&rule.ref_resource)
            .map(|cluster| Arc::clone(cluster.stats())),
        FlowStrategy::Chain => {
            (rule.ref_resource == context_name).then(|| Arc::clone(node.stats()))
        }
        FlowStrategy::Direct => None,
    }
}

/// Cluster-mode check: ask the token service, fall back to the local
/// decision (or pass outright) when it cannot answer.
#[allow(clippy::too_many_arguments)]
fn cluster_check(
    rule: &Arc<FlowRule>,
    all_rules: &[Arc<FlowRule>],
    registry: &NodeRegistry,
    context_name: &str,
    origin: &str,
    node: &Arc<DefaultNode>,
    acquire: u32,
    prioritized: bool,
    now_ms: u64,
    occupy_timeout_ms: u64,
    token_service: Option<&Arc<dyn TokenService>>,
) -> AdmitOutcome {
    let fallback = |reason: &str| {
        if rule.cluster_fallback_to_local {
            warn!(
                resource = %rule.resource,
                flow_id = rule.cluster_flow_id,
                reason,
                "cluster token unavailable, falling back to local check"
            );
            local_check(
                rule,
                all_rules,
                registry,
                context_name,
                origin,
                node,
                acquire,
                prioritized,
                now_ms,
                occupy_timeout_ms,
            )
        } else {
            debug!(
                resource = %rule.resource,
                flow_id = rule.cluster_flow_id,
                reason,
                "cluster token unavailable, rule not activated"
            );
            AdmitOutcome::Pass
        }
    };

    let Some(service) = token_service else {
        return fallback("no token service configured");
    };

    match service.request_token(rule.cluster_flow_id, acquire, prioritized) {
        TokenResult::Ok => AdmitOutcome::Pass,
        TokenResult::ShouldWait { wait_ms } => {
            // The token server granted a slot one tick ahead; park here and
            // proceed as a normal pass.
            WaitGate::new().wait_for(Duration::from_millis(wait_ms));
            AdmitOutcome::Pass
        }
        TokenResult::NoRuleExists => fallback("no rule on token server"),
        TokenResult::BadRequest => fallback("token server rejected request shape"),
        TokenResult::Fail | TokenResult::TooManyRequests => fallback("token server failed"),
        TokenResult::Blocked => AdmitOutcome::Reject,
    }
}
