use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::CoreConfig;
use crate::stat::StatisticNode;
use crate::topo::ClusterNode;

/// Statistics for one resource inside one context.
///
/// Every write is mirrored into the resource's [`ClusterNode`] so the
/// cross-context aggregate never undercounts. Child nodes record the
/// invocation tree below this node; the child list is an immutable vector
/// swapped atomically on add, so readers never lock.
pub struct DefaultNode {
    resource: String,
    context: String,
    stats: Arc<StatisticNode>,
    cluster: Arc<ClusterNode>,
    children: ArcSwap<Vec<Arc<DefaultNode>>>,
    child_lock: Mutex<()>,
}

impl DefaultNode {
    pub(crate) fn new(
        context: &str,
        resource: &str,
        cluster: Arc<ClusterNode>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            resource: resource.to_string(),
            context: context.to_string(),
            stats: Arc::new(StatisticNode::new(config)),
            cluster,
            children: ArcSwap::from_pointee(Vec::new()),
            child_lock: Mutex::new(()),
        }
    } // end constructor

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn stats(&self) -> &Arc<StatisticNode> {
        &self.stats
    }

    pub fn cluster(&self) -> &Arc<ClusterNode> {
        &self.cluster
    }

    pub fn children(&self) -> Arc<Vec<Arc<DefaultNode>>> {
        self.children.load_full()
    }

    /// Attach a child node, once. Adding swaps in a fresh list under a
    /// short lock; self-links and duplicates (by resource) are ignored.
    pub(crate) fn add_child(&self, child: &Arc<DefaultNode>) {
        if child.resource == self.resource {
            return;
        }
        if self.children.load().iter().any(|c| c.resource == child.resource) {
            return;
        }
        let _guard = self.child_lock.lock();
        let current = self.children.load_full();
        if current.iter().any(|c| c.resource == child.resource) {
            return;
        }
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(Arc::clone(child));
        self.children.store(Arc::new(next));
        debug!(
            context = %self.context,
            parent = %self.resource,
            child = %child.resource,
            "linked child node"
        );
    } // end method add_child

    // Writes fan out to the cluster aggregate.

    pub(crate) fn add_pass(&self, now_ms: u64, count: u32) {
        self.stats.add_pass(now_ms, count);
        self.cluster.stats().add_pass(now_ms, count);
    }

    pub(crate) fn add_block(&self, now_ms: u64, count: u32) {
        self.stats.add_block(now_ms, count);
        self.cluster.stats().add_block(now_ms, count);
    }

    pub(crate) fn add_exception(&self, now_ms: u64, count: u32) {
        self.stats.add_exception(now_ms, count);
        self.cluster.stats().add_exception(now_ms, count);
    }

    pub(crate) fn add_rt_and_success(&self, now_ms: u64, rt_ms: u64, count: u32) {
        self.stats.add_rt_and_success(now_ms, rt_ms, count);
        self.cluster.stats().add_rt_and_success(now_ms, rt_ms, count);
    }

    pub(crate) fn inc_thread(&self) {
        self.stats.inc_thread();
        self.cluster.stats().inc_thread();
    }

    pub(crate) fn dec_thread(&self) {
        self.stats.dec_thread();
        self.cluster.stats().dec_thread();
    }
}
