//! Sliding-window statistics.
//!
//! The infrastructure is a ring of time-aligned buckets ([`leap_array`])
//! holding atomic event counters ([`bucket`]). [`metric`] aggregates the
//! live buckets of one ring; [`node`] combines a sub-second ring, a
//! one-minute ring and a live thread counter into the statistic unit every
//! admission decision reads from.
//!
//! Maintenance is opportunistic: whoever touches a ring recycles stale
//! buckets in place. There are no background threads.

pub(crate) mod bucket;
pub(crate) use bucket::MetricEvent;

pub(crate) mod window;
pub(crate) use window::WindowWrap;

pub(crate) mod leap_array;
pub(crate) use leap_array::{LeapArray, RingLifecycle};

pub(crate) mod metric;
pub use metric::MetricSnapshot;
pub(crate) use metric::SlidingMetric;

mod node;
pub use node::StatisticNode;
