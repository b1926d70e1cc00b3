use std::sync::Arc;

use crate::error::BlockError;
use crate::stat::StatisticNode;
use crate::topo::DefaultNode;

/// Direction of the protected call; inbound entries also feed the global
/// inbound aggregate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrafficType {
    Inbound,
    Outbound,
}

/// Hook run when the entry terminates (normal exit or block), with the
/// terminate timestamp.
pub(crate) type TerminateHook = Box<dyn FnOnce(&Entry, u64) + Send>;

/// One admitted (or blocked) protected call.
///
/// Returned by [`Engine::enter`](crate::Engine::enter) on admission; the
/// caller runs the protected work, optionally records a failure, and hands
/// the entry back to [`Engine::exit`](crate::Engine::exit).
pub struct Entry {
    resource: String,
    traffic: TrafficType,
    batch: u32,
    create_ms: u64,
    complete_ms: Option<u64>,
    priority_admitted: bool,
    node: Arc<DefaultNode>,
    origin_node: Option<Arc<StatisticNode>>,
    error: Option<String>,
    block_error: Option<BlockError>,
    hooks: Vec<TerminateHook>,
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("resource", &self.resource)
            .field("traffic", &self.traffic)
            .field("batch", &self.batch)
            .field("create_ms", &self.create_ms)
            .field("complete_ms", &self.complete_ms)
            .field("priority_admitted", &self.priority_admitted)
            .field("error", &self.error)
            .field("block_error", &self.block_error)
            .finish_non_exhaustive()
    }
}

impl Entry {
    pub(crate) fn new(
        resource: &str,
        traffic: TrafficType,
        batch: u32,
        create_ms: u64,
        node: Arc<DefaultNode>,
        origin_node: Option<Arc<StatisticNode>>,
    ) -> Self {
        Self {
            resource: resource.to_string(),
            traffic,
            batch,
            create_ms,
            complete_ms: None,
            priority_admitted: false,
            node,
            origin_node,
            error: None,
            block_error: None,
            hooks: Vec::new(),
        }
    } // end constructor

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn traffic(&self) -> TrafficType {
        self.traffic
    }

    pub fn batch(&self) -> u32 {
        self.batch
    }

    pub fn create_ms(&self) -> u64 {
        self.create_ms
    }

    /// Whether admission went through a priority wait.
    pub fn priority_admitted(&self) -> bool {
        self.priority_admitted
    }

    pub fn node(&self) -> &Arc<DefaultNode> {
        &self.node
    }

    pub fn origin_node(&self) -> Option<&Arc<StatisticNode>> {
        self.origin_node.as_ref()
    }

    /// Record that the protected work failed. Counted as an exception on
    /// exit and fed to the breakers as a failed completion.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn block_error(&self) -> Option<&BlockError> {
        self.block_error.as_ref()
    }

    /// Response time once completed.
    pub fn rt(&self) -> Option<u64> {
        self.complete_ms.map(|done| done - self.create_ms)
    }

    pub(crate) fn mark_priority_admitted(&mut self) {
        self.priority_admitted = true;
    }

    pub(crate) fn set_block_error(&mut self, error: BlockError) {
        self.block_error = Some(error);
    }

    pub(crate) fn set_complete(&mut self, now_ms: u64) {
        self.complete_ms = Some(now_ms);
    }

    pub(crate) fn on_terminate(&mut self, hook: TerminateHook) {
        self.hooks.push(hook);
    }

    pub(crate) fn run_terminate_hooks(&mut self, now_ms: u64) {
        let hooks = std::mem::take(&mut self.hooks);
        for hook in hooks {
            hook(&*self, now_ms);
        }
    }
}
