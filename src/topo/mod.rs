//! Invocation topology.
//!
//! Each protected call is routed to the statistics that govern it:
//! - a [`DefaultNode`] per (context, resource) pair, forming the
//!   per-context invocation tree
//! - a [`ClusterNode`] per resource, aggregating across all contexts and
//!   holding per-origin statistics
//! - an [`EntranceNode`] per context, the tree root, whose metrics are the
//!   sum of its children
//!
//! Nodes are created lazily on first entry and live for the process.

mod cluster_node;
pub use cluster_node::ClusterNode;

mod default_node;
pub use default_node::DefaultNode;

mod entrance_node;
pub use entrance_node::EntranceNode;

mod registry;
pub(crate) use registry::NodeRegistry;
