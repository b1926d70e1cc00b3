use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::debug;

use crate::topo::DefaultNode;

/// Root of one context's invocation tree.
///
/// The entrance node carries no counters of its own: every metric is the
/// sum over its first-level children, except `avg_rt`, which is the
/// pass-QPS-weighted mean. Same context name shares the same entrance node
/// process-wide.
pub struct EntranceNode {
    context: String,
    children: ArcSwap<Vec<Arc<DefaultNode>>>,
    child_lock: Mutex<()>,
}

impl EntranceNode {
    pub(crate) fn new(context: &str) -> Self {
        Self {
            context: context.to_string(),
            children: ArcSwap::from_pointee(Vec::new()),
            child_lock: Mutex::new(()),
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn children(&self) -> Arc<Vec<Arc<DefaultNode>>> {
        self.children.load_full()
    }

    pub(crate) fn add_child(&self, child: &Arc<DefaultNode>) {
        if self
            .children
            .load()
            .iter()
            .any(|c| c.resource() == child.resource())
        {
            return;
        }
        let _guard = self.child_lock.lock();
        let current = self.children.load_full();
        if current.iter().any(|c| c.resource() == child.resource()) {
            return;
        }
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(Arc::clone(child));
        self.children.store(Arc::new(next));
        debug!(context = %self.context, child = %child.resource(), "linked entrance child");
    }

    fn sum(&self, f: impl Fn(&DefaultNode) -> f64) -> f64 {
        self.children.load().iter().map(|c| f(c)).sum()
    }

    pub fn pass_qps(&self, now_ms: u64) -> f64 {
        self.sum(|c| c.stats().pass_qps(now_ms))
    }

    pub fn block_qps(&self, now_ms: u64) -> f64 {
        self.sum(|c| c.stats().block_qps(now_ms))
    }

    pub fn success_qps(&self, now_ms: u64) -> f64 {
        self.sum(|c| c.stats().success_qps(now_ms))
    }

    pub fn total_qps(&self, now_ms: u64) -> f64 {
        self.sum(|c| c.stats().total_qps(now_ms))
    }

    /// Pass-QPS-weighted mean of the children's average response times.
    pub fn avg_rt(&self, now_ms: u64) -> f64 {
        let mut weighted = 0.0;
        let mut total_qps = 0.0;
        for child in self.children.load().iter() {
            let qps = child.stats().pass_qps(now_ms);
            weighted += child.stats().avg_rt(now_ms) * qps;
            total_qps += qps;
        }
        weighted / if total_qps == 0.0 { 1.0 } else { total_qps }
    }

    pub fn cur_thread_num(&self) -> u32 {
        self.children
            .load()
            .iter()
            .map(|c| c.stats().cur_thread_num())
            .sum()
    }

    pub fn total_request(&self, now_ms: u64) -> u64 {
        self.children
            .load()
            .iter()
            .map(|c| c.stats().total_request(now_ms))
            .sum()
    }

    pub fn total_pass(&self, now_ms: u64) -> u64 {
        self.children
            .load()
            .iter()
            .map(|c| c.stats().total_pass(now_ms))
            .sum()
    }

    pub fn block_request(&self, now_ms: u64) -> u64 {
        self.children
            .load()
            .iter()
            .map(|c| c.stats().block_request(now_ms))
            .sum()
    }
}
