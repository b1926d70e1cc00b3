//! Rate-limit admission control.
//!
//! A [`FlowRule`] names a resource, a threshold (threads or QPS) and a
//! node-selection strategy. The checker resolves which statistic node the
//! rule governs (cluster, origin, related or chained node), then the
//! controller compares live usage against the threshold. Prioritized
//! requests over a QPS threshold may borrow capacity from a future bucket
//! instead of being rejected outright.

mod rule;
pub use rule::{FlowGrade, FlowRule, FlowStrategy};

mod controller;
pub(crate) use controller::{AdmitOutcome, can_pass};

mod checker;
pub(crate) use checker::{FlowOutcome, check_flow};

mod cluster;
pub use cluster::{TokenResult, TokenService};

/// Rules with this limit app govern all origins.
pub const LIMIT_APP_DEFAULT: &str = "default";
/// Rules with this limit app govern origins no other rule names.
pub const LIMIT_APP_OTHER: &str = "other";
