//! Floodgate is an embeddable traffic-governance core: it keeps real-time
//! sliding-window statistics for every protected resource and uses them to
//! decide, at sub-millisecond cost, whether each call may pass right now.
//!
//! The crate focuses on:
//! - concurrency safety (multi-threaded access, no global locks)
//! - low per-request overhead (lock-free hot path over ring buckets)
//! - predictable behavior under load (bounded priority waits, fail-fast
//!   circuit breaking)
//!
//! Three subsystems cooperate behind a single [`Engine`]:
//! - ring-structured sliding-window counters over configurable horizons
//! - admission controllers: a QPS/thread rate limiter with a
//!   borrow-from-future mechanism, and circuit breakers driven by error or
//!   slow-call statistics
//! - an invocation topology (per-context trees, per-resource cluster
//!   aggregates, per-origin statistics) that routes each call to the right
//!   counter
//!
//! # Quick start
//!
//! ```rust
//! use floodgate::{CoreConfig, Engine, FlowRule, FlowGrade, TrafficType};
//!
//! let engine = Engine::new(CoreConfig::default()).unwrap();
//! engine
//!     .load_flow_rules(vec![FlowRule {
//!         resource: "get_user".into(),
//!         grade: FlowGrade::Qps,
//!         count: 100.0,
//!         ..FlowRule::default()
//!     }])
//!     .unwrap();
//!
//! let mut ctx = engine.context("web", "");
//! match engine.enter(&mut ctx, "get_user", TrafficType::Inbound, 1, false) {
//!     Ok(entry) => {
//!         // protected work here
//!         engine.exit(&mut ctx, entry);
//!     }
//!     Err(blocked) => {
//!         let _ = blocked; // map to HTTP 429 / fallback
//!     }
//! }
//! ```

mod clock;
pub use clock::Clock;

mod config;
pub use config::CoreConfig;

mod error;
pub use error::{BlockError, ConfigError, RuleError};

pub mod stat;
pub use stat::{MetricSnapshot, StatisticNode};

pub mod topo;
pub use topo::{ClusterNode, DefaultNode, EntranceNode};

pub mod flow;
pub use flow::{FlowGrade, FlowRule, FlowStrategy, TokenResult, TokenService};

pub mod breaker;
pub use breaker::{
    BreakerState, CircuitBreaker, DegradeGrade, DegradeRule, ObserverRegistry,
    StateChangeObserver,
};

mod engine;
pub use engine::{Context, Engine, Entry, TrafficType};

mod sleep;

#[cfg(test)]
mod tests;
