//! Entry/exit orchestration.
//!
//! The engine wires the statistics topology to the admission controllers:
//! every `enter` resolves the governed nodes, runs flow rules then circuit
//! breakers, and books the outcome; every `exit` records response time and
//! completion outcome and feeds the breakers.

mod context;
pub use context::Context;

mod entry;
pub use entry::{Entry, TrafficType};

mod core;
pub use core::Engine;
