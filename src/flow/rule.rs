use crate::error::RuleError;
use crate::flow::LIMIT_APP_DEFAULT;

/// What the threshold counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlowGrade {
    /// Concurrent threads inside the resource.
    Thread,
    /// Passes per second over the sliding window.
    #[default]
    Qps,
}

/// Which node the threshold applies to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlowStrategy {
    /// The resource's own node (cluster or origin node).
    #[default]
    Direct,
    /// The cluster node of `ref_resource`.
    Relate,
    /// The current node, but only when entered through the
    /// `ref_resource` context.
    Chain,
}

/// One rate-limit rule.
///
/// `limit_app` scopes the rule to callers: `"default"` governs everyone,
/// a concrete origin governs that caller, `"other"` governs callers no
/// sibling rule names explicitly.
#[derive(Clone, Debug)]
pub struct FlowRule {
    pub resource: String,
    pub limit_app: String,
    pub grade: FlowGrade,
    /// Threshold: thread count or passes per second, by grade.
    pub count: f64,
    pub strategy: FlowStrategy,
    /// Related resource or required context, by strategy.
    pub ref_resource: String,
    /// Ask a cluster token service before deciding locally.
    pub cluster_mode: bool,
    /// Flow id presented to the token service.
    pub cluster_flow_id: u64,
    /// Fall back to the local check when the token service is unavailable;
    /// otherwise the rule simply passes.
    pub cluster_fallback_to_local: bool,
}

impl Default for FlowRule {
    fn default() -> Self {
        Self {
            resource: String::new(),
            limit_app: LIMIT_APP_DEFAULT.to_string(),
            grade: FlowGrade::default(),
            count: 0.0,
            strategy: FlowStrategy::default(),
            ref_resource: String::new(),
            cluster_mode: false,
            cluster_flow_id: 0,
            cluster_fallback_to_local: true,
        }
    }
}

impl FlowRule {
    pub(crate) fn validate(&self) -> Result<(), RuleError> {
        let invalid = |reason| RuleError::InvalidFlowRule {
            resource: self.resource.clone(),
            reason,
        };
        if self.resource.is_empty() {
            return Err(invalid("resource must not be empty"));
        }
        if self.limit_app.is_empty() {
            return Err(invalid("limit app must not be empty"));
        }
        if !(self.count >= 0.0) {
            return Err(invalid("threshold must be non-negative"));
        }
        if matches!(self.strategy, FlowStrategy::Relate | FlowStrategy::Chain)
            && self.ref_resource.is_empty()
        {
            return Err(invalid("relate/chain strategy requires a ref resource"));
        }
        Ok(())
    }
}
