use crate::error::RuleError;
use crate::flow::LIMIT_APP_DEFAULT;

/// What trips the breaker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DegradeGrade {
    /// Ratio of calls slower than `count` milliseconds, against
    /// `slow_ratio_threshold`.
    #[default]
    SlowRatio,
    /// Ratio of failed calls, against `count`.
    ExceptionRatio,
    /// Absolute number of failed calls in the window, against `count`.
    ExceptionCount,
}

/// One circuit-breaker rule.
#[derive(Clone, Debug)]
pub struct DegradeRule {
    pub resource: String,
    pub limit_app: String,
    pub grade: DegradeGrade,
    /// Threshold: max allowed rt (ms) for `SlowRatio`, error ratio in
    /// [0, 1] for `ExceptionRatio`, error count for `ExceptionCount`.
    pub count: f64,
    /// Recovery timeout: how long the breaker stays open before probing.
    pub time_window_s: u32,
    /// Minimum completions in the window before the breaker may trip.
    pub min_request_amount: u64,
    /// Span of the breaker's statistics window.
    pub stat_interval_ms: u32,
    /// Trip ratio for `SlowRatio`, in [0, 1].
    pub slow_ratio_threshold: f64,
}

impl Default for DegradeRule {
    fn default() -> Self {
        Self {
            resource: String::new(),
            limit_app: LIMIT_APP_DEFAULT.to_string(),
            grade: DegradeGrade::default(),
            count: 0.0,
            time_window_s: 0,
            min_request_amount: 5,
            stat_interval_ms: 1_000,
            slow_ratio_threshold: 1.0,
        }
    }
}

impl DegradeRule {
    pub(crate) fn validate(&self) -> Result<(), RuleError> {
        let invalid = |reason| RuleError::InvalidDegradeRule {
            resource: self.resource.clone(),
            reason,
        };
        if self.resource.is_empty() {
            return Err(invalid("resource must not be empty"));
        }
        if !(self.count >= 0.0) {
            return Err(invalid("threshold must be non-negative"));
        }
        if self.time_window_s == 0 {
            return Err(invalid("recovery time window must be positive"));
        }
        if self.min_request_amount == 0 {
            return Err(invalid("min request amount must be positive"));
        }
        if self.stat_interval_ms == 0 {
            return Err(invalid("stat interval must be positive"));
        }
        match self.grade {
            DegradeGrade::ExceptionRatio if self.count > 1.0 => {
                Err(invalid("exception ratio threshold must be within [0, 1]"))
            }
            DegradeGrade::SlowRatio
                if !(0.0..=1.0).contains(&self.slow_ratio_threshold) =>
            {
                Err(invalid("slow ratio threshold must be within [0, 1]"))
            }
            _ => Ok(()),
        }
    }
}
