use std::sync::Arc;

use crate::breaker::DegradeRule;
use crate::flow::FlowRule;

/// A protected call was rejected by an admission controller.
///
/// Blocks are surfaced to the caller as failures; nothing is retried or
/// recovered silently. The variant carries the rule that fired so adapter
/// layers can map the rejection (HTTP status, fallback, ...) and report
/// which limit app it applied to.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BlockError {
    /// Rejected by a rate-limit rule.
    #[error("flow control rejected call to `{}` (limit app `{}`)", rule.resource, rule.limit_app)]
    Flow { rule: Arc<FlowRule> },

    /// Rejected by a circuit breaker.
    #[error("circuit breaker rejected call to `{}` (limit app `{}`)", rule.resource, rule.limit_app)]
    Degrade { rule: Arc<DegradeRule> },
}

impl BlockError {
    /// Resource name the triggering rule was registered for.
    pub fn resource(&self) -> &str {
        match self {
            BlockError::Flow { rule } => &rule.resource,
            BlockError::Degrade { rule } => &rule.resource,
        }
    }

    /// Limit app of the triggering rule.
    pub fn limit_app(&self) -> &str {
        match self {
            BlockError::Flow { rule } => &rule.limit_app,
            BlockError::Degrade { rule } => &rule.limit_app,
        }
    }
}

/// A rule was rejected at registration time.
///
/// Invalid rules never take part in admission decisions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleError {
    #[error("invalid flow rule for `{resource}`: {reason}")]
    InvalidFlowRule { resource: String, reason: &'static str },

    #[error("invalid degrade rule for `{resource}`: {reason}")]
    InvalidDegradeRule { resource: String, reason: &'static str },
}

/// Engine configuration failed validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("sample count must be positive, got {0}")]
    InvalidSampleCount(u32),

    #[error("interval ({interval_ms} ms) must be a positive multiple of sample count {sample_count}")]
    InvalidInterval { interval_ms: u32, sample_count: u32 },

    #[error("occupy timeout must be positive, got {0}")]
    InvalidOccupyTimeout(u32),
}
