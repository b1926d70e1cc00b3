use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::config::CoreConfig;
use crate::topo::{ClusterNode, DefaultNode, EntranceNode};

/// Resource name the global inbound aggregate is filed under.
pub(crate) const TOTAL_INBOUND_RESOURCE: &str = "__total_inbound_traffic__";

/// Lazily built, process-lifetime node tables.
///
/// Nodes are created on first entry for a (context, resource) pair and are
/// never removed; buckets inside them recycle in place.
pub(crate) struct NodeRegistry {
    config: CoreConfig,
    clusters: DashMap<String, Arc<ClusterNode>>,
    entrances: DashMap<String, Arc<EntranceNode>>,
    nodes: DashMap<(String, String), Arc<DefaultNode>>,
    global_in: Arc<ClusterNode>,
}

impl NodeRegistry {
    pub(crate) fn new(config: CoreConfig) -> Self {
        let global_in = Arc::new(ClusterNode::new(TOTAL_INBOUND_RESOURCE, &config));
        Self {
            config,
            clusters: DashMap::new(),
            entrances: DashMap::new(),
            nodes: DashMap::new(),
            global_in,
        }
    }

    /// Aggregate of all inbound traffic across every resource.
    pub(crate) fn global_in(&self) -> &Arc<ClusterNode> {
        &self.global_in
    }

    pub(crate) fn cluster_node(&self, resource: &str) -> Arc<ClusterNode> {
        if let Some(node) = self.clusters.get(resource) {
            return Arc::clone(node.value());
        }
        self.clusters
            .entry(resource.to_string())
            .or_insert_with(|| Arc::new(ClusterNode::new(resource, &self.config)))
            .value()
            .clone()
    }

    /// Cluster node lookup without creating one.
    pub(crate) fn get_cluster_node(&self, resource: &str) -> Option<Arc<ClusterNode>> {
        self.clusters.get(resource).map(|n| Arc::clone(n.value()))
    }

    pub(crate) fn entrance_node(&self, context: &str) -> Arc<EntranceNode> {
        if let Some(node) = self.entrances.get(context) {
            return Arc::clone(node.value());
        }
        self.entrances
            .entry(context.to_string())
            .or_insert_with(|| {
                debug!(%context, "creating entrance node");
                Arc::new(EntranceNode::new(context))
            })
            .value()
            .clone()
    }

    /// The per-(context, resource) node, created on first use and wired to
    /// the resource's cluster node.
    pub(crate) fn node(&self, context: &str, resource: &str) -> Arc<DefaultNode> {
        let key = (context.to_string(), resource.to_string());
        if let Some(node) = self.nodes.get(&key) {
            return Arc::clone(node.value());
        }
        let cluster = self.cluster_node(resource);
        self.nodes
            .entry(key)
            .or_insert_with(|| {
                debug!(%context, %resource, "creating statistic node");
                Arc::new(DefaultNode::new(context, resource, cluster, &self.config))
            })
            .value()
            .clone()
    }
}
