use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{info, trace, warn};

use crate::breaker::{
    CircuitBreaker, DegradeGrade, DegradeRule, ExceptionCircuitBreaker, ObserverRegistry,
    SlowRequestCircuitBreaker,
};
use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::engine::context::Context;
use crate::engine::entry::{Entry, TrafficType};
use crate::error::{BlockError, ConfigError, RuleError};
use crate::flow::{FlowOutcome, FlowRule, TokenService, check_flow};
use crate::sleep::WaitGate;
use crate::stat::MetricSnapshot;
use crate::topo::{ClusterNode, EntranceNode, NodeRegistry};

/// The traffic-governance engine.
///
/// Owns the node topology, the rule tables and the clock. All state lives
/// inside the engine; two engines in one process are fully independent.
/// `enter`/`exit` are the hot path; rule loading swaps whole per-resource
/// tables and may run concurrently with admission.
pub struct Engine {
    config: CoreConfig,
    clock: Clock,
    registry: NodeRegistry,
    flow_rules: DashMap<String, Arc<Vec<Arc<FlowRule>>>>,
    breakers: DashMap<String, Arc<Vec<Arc<dyn CircuitBreaker>>>>,
    observers: Arc<ObserverRegistry>,
    token_service: Option<Arc<dyn TokenService>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(config: CoreConfig) -> Result<Self, ConfigError> {
        Self::with_observers(config, ObserverRegistry::new())
    }

    /// Build an engine with breaker state-change observers. The registry is
    /// fixed for the engine's lifetime; observers run synchronously on the
    /// transitioning thread.
    pub fn with_observers(
        config: CoreConfig,
        observers: ObserverRegistry,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            registry: NodeRegistry::new(config.clone()),
            config,
            clock: Clock::new(),
            flow_rules: DashMap::new(),
            breakers: DashMap::new(),
            observers: Arc::new(observers),
            token_service: None,
        })
    }

    /// Attach a cluster token service consulted by cluster-mode flow rules.
    pub fn with_token_service(mut self, service: Arc<dyn TokenService>) -> Self {
        self.token_service = Some(service);
        self
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// The engine's monotone clock.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    // ---- rule management ----

    /// Replace the whole flow-rule table. Every rule is validated first;
    /// on any invalid rule nothing changes.
    pub fn load_flow_rules(&self, rules: Vec<FlowRule>) -> Result<(), RuleError> {
        for rule in &rules {
            rule.validate()?;
        }
        let mut grouped: HashMap<String, Vec<Arc<FlowRule>>> = HashMap::new();
        for rule in rules {
            grouped
                .entry(rule.resource.clone())
                .or_default()
                .push(Arc::new(rule));
        }
        self.flow_rules.clear();
        let mut total = 0usize;
        for (resource, rules) in grouped {
            total += rules.len();
            self.flow_rules.insert(resource, Arc::new(rules));
        }
        info!(rules = total, "flow rules loaded");
        Ok(())
    } // end method load_flow_rules

    /// Replace the whole degrade-rule table, compiling one breaker per
    /// rule. Every rule is validated first; on any invalid rule nothing
    /// changes.
    pub fn load_degrade_rules(&self, rules: Vec<DegradeRule>) -> Result<(), RuleError> {
        for rule in &rules {
            rule.validate()?;
        }
        let mut grouped: HashMap<String, Vec<Arc<dyn CircuitBreaker>>> = HashMap::new();
        for rule in rules {
            let resource = rule.resource.clone();
            let rule = Arc::new(rule);
            let breaker: Arc<dyn CircuitBreaker> = match rule.grade {
                DegradeGrade::SlowRatio => Arc::new(SlowRequestCircuitBreaker::new(
                    rule,
                    Arc::clone(&self.observers),
                )),
                DegradeGrade::ExceptionRatio | DegradeGrade::ExceptionCount => Arc::new(
                    ExceptionCircuitBreaker::new(rule, Arc::clone(&self.observers)),
                ),
            };
            grouped.entry(resource).or_default().push(breaker);
        }
        self.breakers.clear();
        let mut total = 0usize;
        for (resource, breakers) in grouped {
            total += breakers.len();
            self.breakers.insert(resource, Arc::new(breakers));
        }
        info!(breakers = total, "degrade rules loaded");
        Ok(())
    } // end method load_degrade_rules

    /// Breakers currently bound to `resource`.
    pub fn circuit_breakers(&self, resource: &str) -> Vec<Arc<dyn CircuitBreaker>> {
        self.breakers
            .get(resource)
            .map(|b| b.value().as_ref().clone())
            .unwrap_or_default()
    }

    // ---- topology accessors ----

    /// Per-resource aggregate, if the resource has been entered.
    pub fn cluster_node(&self, resource: &str) -> Option<Arc<ClusterNode>> {
        self.registry.get_cluster_node(resource)
    }

    /// Global inbound aggregate.
    pub fn global_inbound_node(&self) -> Arc<ClusterNode> {
        Arc::clone(self.registry.global_in())
    }

    pub fn entrance_node(&self, context_name: &str) -> Arc<EntranceNode> {
        self.registry.entrance_node(context_name)
    }

    /// Unfetched per-second metrics of a resource's cluster node. Callers
    /// must serialize fetches per resource.
    pub fn metrics(&self, resource: &str) -> std::collections::BTreeMap<u64, MetricSnapshot> {
        match self.registry.get_cluster_node(resource) {
            Some(cluster) => cluster.stats().metrics(self.clock.now_ms()),
            None => Default::default(),
        }
    }

    // ---- pipeline ----

    /// Open an invocation context. Same context name shares the same
    /// entrance node; the origin identifies the caller for origin-scoped
    /// rules.
    pub fn context(&self, name: &str, origin: &str) -> Context {
        Context::new(name, origin, self.registry.entrance_node(name))
    }

    /// Admit or reject one call on `resource`.
    ///
    /// Flow rules run first, then circuit breakers. On admission the entry
    /// is booked into the context's node, the caller's origin node and
    /// (for inbound traffic) the global inbound aggregate. A prioritized
    /// request that misses a QPS threshold may be parked for a bounded
    /// wait and then admitted against a future bucket.
    ///
    /// The returned entry must be handed back to [`exit`](Engine::exit);
    /// blocks are returned as [`BlockError`] and already booked as blocked
    /// traffic.
    pub fn enter(
        &self,
        ctx: &mut Context,
        resource: &str,
        traffic: TrafficType,
        batch: u32,
        prioritized: bool,
    ) -> Result<Entry, BlockError> {
        let now = self.clock.now_ms();
        let node = self.registry.node(ctx.name(), resource);

        // Link into the invocation tree: below the enclosing entry, or at
        // the entrance for a first-level call.
        match ctx.current_node() {
            Some(parent) => parent.add_child(&node),
            None => ctx.entrance_node().add_child(&node),
        }

        let origin_node = (!ctx.origin().is_empty())
            .then(|| node.cluster().origin_node(ctx.origin()));

        let mut entry = Entry::new(
            resource,
            traffic,
            batch,
            now,
            Arc::clone(&node),
            origin_node,
        );

        // Flow rules.
        let flow_outcome = match self.flow_rules.get(resource).map(|r| Arc::clone(r.value())) {
            Some(rules) => check_flow(
                &rules,
                &self.registry,
                ctx.name(),
                ctx.origin(),
                &node,
                batch,
                prioritized,
                now,
                self.config.occupy_timeout_ms as u64,
                self.token_service.as_ref(),
            ),
            None => Ok(FlowOutcome::Pass),
        };

        let flow_outcome = match flow_outcome {
            Ok(outcome) => outcome,
            Err(block) => return Err(self.block(entry, block)),
        };

        if let FlowOutcome::PriorityWait(wait_ms) = flow_outcome {
            // Park until the borrowed bucket becomes current. An early
            // wakeup just means zero remaining wait.
            trace!(resource, wait_ms, "priority wait granted");
            WaitGate::new().wait_for(Duration::from_millis(wait_ms));

            // The pass was already booked as an occupied pass; only thread
            // counts move here.
            entry.mark_priority_admitted();
            node.inc_thread();
            if let Some(origin) = entry.origin_node() {
                origin.inc_thread();
            }
            if traffic == TrafficType::Inbound {
                self.registry.global_in().stats().inc_thread();
            }
            ctx.push_node(node);
            return Ok(entry);
        }

        // Circuit breakers.
        if let Some(breakers) = self.breakers.get(resource).map(|b| Arc::clone(b.value())) {
            for breaker in breakers.iter() {
                if !breaker.try_pass(&mut entry, now) {
                    let block = BlockError::Degrade {
                        rule: Arc::clone(breaker.rule()),
                    };
                    return Err(self.block(entry, block));
                }
            }
        }

        // Admitted: thread and pass counts on every governed aggregate.
        node.inc_thread();
        node.add_pass(now, batch);
        if let Some(origin) = entry.origin_node() {
            origin.inc_thread();
            origin.add_pass(now, batch);
        }
        if traffic == TrafficType::Inbound {
            let global = self.registry.global_in().stats();
            global.inc_thread();
            global.add_pass(now, batch);
        }
        ctx.push_node(node);
        Ok(entry)
    } // end method enter

    /// Book a rejection and surface it as the block error.
    fn block(&self, mut entry: Entry, block: BlockError) -> BlockError {
        let now = self.clock.now_ms();
        entry.set_block_error(block.clone());
        entry.run_terminate_hooks(now);

        let batch = entry.batch();
        entry.node().add_block(now, batch);
        if let Some(origin) = entry.origin_node() {
            origin.add_block(now, batch);
        }
        if entry.traffic() == TrafficType::Inbound {
            self.registry.global_in().stats().add_block(now, batch);
        }
        block
    }

    /// Complete an admitted entry: record response time and outcome, then
    /// drive the resource's circuit breakers.
    pub fn exit(&self, ctx: &mut Context, mut entry: Entry) {
        let now = self.clock.now_ms();

        match ctx.pop_node() {
            Some(node) if Arc::ptr_eq(&node, entry.node()) => {}
            _ => warn!(
                resource = %entry.resource(),
                "entries exited out of order; invocation tree may be inaccurate"
            ),
        }

        entry.set_complete(now);
        entry.run_terminate_hooks(now);

        if entry.block_error().is_some() {
            return;
        }

        let rt = now - entry.create_ms();
        let batch = entry.batch();
        let failed = entry.has_error();

        entry.node().add_rt_and_success(now, rt, batch);
        entry.node().dec_thread();
        if failed {
            entry.node().add_exception(now, batch);
        }

        if let Some(origin) = entry.origin_node() {
            origin.add_rt_and_success(now, rt, batch);
            origin.dec_thread();
            if failed {
                origin.add_exception(now, batch);
            }
        }

        if entry.traffic() == TrafficType::Inbound {
            let global = self.registry.global_in().stats();
            global.add_rt_and_success(now, rt, batch);
            global.dec_thread();
            if failed {
                global.add_exception(now, batch);
            }
        }

        if let Some(breakers) = self.breakers.get(entry.resource()).map(|b| Arc::clone(b.value())) {
            for breaker in breakers.iter() {
                breaker.on_request_complete(&entry, now);
            }
        }
    } // end method exit
}
