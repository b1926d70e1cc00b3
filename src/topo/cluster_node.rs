use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::config::CoreConfig;
use crate::stat::StatisticNode;

/// Per-resource aggregate across every context.
///
/// One cluster node exists per resource name regardless of how many
/// contexts the resource is entered from ("cluster" here means the cluster
/// point of the invocation graph, not a network cluster). It also owns one
/// [`StatisticNode`] per calling origin so rules can limit specific
/// callers.
pub struct ClusterNode {
    resource: String,
    stats: Arc<StatisticNode>,
    origins: DashMap<String, Arc<StatisticNode>>,
    config: CoreConfig,
}

impl ClusterNode {
    pub(crate) fn new(resource: &str, config: &CoreConfig) -> Self {
        Self {
            resource: resource.to_string(),
            stats: Arc::new(StatisticNode::new(config)),
            origins: DashMap::new(),
            config: config.clone(),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Aggregate statistics of the resource.
    pub fn stats(&self) -> &Arc<StatisticNode> {
        &self.stats
    }

    /// Statistics of one calling origin, created lazily.
    pub fn origin_node(&self, origin: &str) -> Arc<StatisticNode> {
        if let Some(node) = self.origins.get(origin) {
            return Arc::clone(node.value());
        }
        let node = self
            .origins
            .entry(origin.to_string())
            .or_insert_with(|| {
                debug!(resource = %self.resource, %origin, "creating origin node");
                Arc::new(StatisticNode::new(&self.config))
            })
            .value()
            .clone();
        node
    }
}
