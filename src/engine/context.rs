use std::sync::Arc;

use crate::topo::{DefaultNode, EntranceNode};

/// One invocation chain inside a named context.
///
/// A context tracks the stack of active entries so nested entries link
/// into the invocation tree below their parent. It is a cheap per-request
/// handle: create one per call chain and keep it on that thread. Entries
/// must exit in LIFO order.
pub struct Context {
    name: String,
    origin: String,
    entrance: Arc<EntranceNode>,
    stack: Vec<Arc<DefaultNode>>,
}

impl Context {
    pub(crate) fn new(name: &str, origin: &str, entrance: Arc<EntranceNode>) -> Self {
        Self {
            name: name.to_string(),
            origin: origin.to_string(),
            entrance,
            stack: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity of the caller, empty when anonymous.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn entrance_node(&self) -> &Arc<EntranceNode> {
        &self.entrance
    }

    pub(crate) fn current_node(&self) -> Option<&Arc<DefaultNode>> {
        self.stack.last()
    }

    pub(crate) fn push_node(&mut self, node: Arc<DefaultNode>) {
        self.stack.push(node);
    }

    pub(crate) fn pop_node(&mut self) -> Option<Arc<DefaultNode>> {
        self.stack.pop()
    }
}
