//! Circuit breaking.
//!
//! Each degrade rule compiles into one breaker: a three-state machine
//! (closed, open, half-open) over its own sliding window of completion
//! outcomes. State transitions are CAS-ordered per breaker and fan out
//! synchronously to the observer registry the engine was built with.

mod rule;
pub use rule::{DegradeGrade, DegradeRule};

pub(crate) mod counters;

mod exception;
pub use exception::ExceptionCircuitBreaker;

mod slow;
pub use slow::SlowRequestCircuitBreaker;

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use tracing::info;

use crate::engine::Entry;

/// Breaker state.
///
/// `Closed` lets traffic through, `Open` short-circuits it, `HalfOpen`
/// admits exactly one probe whose outcome decides the next state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BreakerState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl BreakerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => BreakerState::Closed,
            1 => BreakerState::Open,
            _ => BreakerState::HalfOpen,
        }
    }
}

/// Synchronous observer of breaker state transitions.
///
/// Runs on the thread that caused the transition; keep implementations
/// short.
pub trait StateChangeObserver: Send + Sync {
    fn on_state_change(
        &self,
        prev: BreakerState,
        next: BreakerState,
        rule: &DegradeRule,
        snapshot: Option<f64>,
    );
}

/// Observers handed to the engine at construction. There is no ambient
/// process-wide registry; each engine owns its own.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<Box<dyn StateChangeObserver>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Box<dyn StateChangeObserver>) {
        self.observers.push(observer);
    }

    fn notify(
        &self,
        prev: BreakerState,
        next: BreakerState,
        rule: &DegradeRule,
        snapshot: Option<f64>,
    ) {
        for observer in &self.observers {
            observer.on_state_change(prev, next, rule, snapshot);
        }
    }
}

/// One circuit breaker bound to a resource.
pub trait CircuitBreaker: Send + Sync {
    fn rule(&self) -> &Arc<DegradeRule>;

    fn state(&self) -> BreakerState;

    /// Admission check. May transition Open → HalfOpen, in which case the
    /// entry becomes the probe and carries a terminate hook that falls
    /// back to Open when the probe is blocked downstream.
    fn try_pass(&self, entry: &mut Entry, now_ms: u64) -> bool;

    /// Feed one completed (non-blocked) call into the breaker's window and
    /// drive the state machine.
    fn on_request_complete(&self, entry: &Entry, now_ms: u64);
}

/// State, retry deadline and observer fan-out shared by every breaker
/// flavour.
pub(crate) struct BreakerShared {
    rule: Arc<DegradeRule>,
    recovery_ms: u64,
    state: AtomicU8,
    next_retry_ms: AtomicU64,
    observers: Arc<ObserverRegistry>,
}

impl BreakerShared {
    pub(crate) fn new(rule: Arc<DegradeRule>, observers: Arc<ObserverRegistry>) -> Self {
        let recovery_ms = rule.time_window_s as u64 * 1000;
        Self {
            rule,
            recovery_ms,
            state: AtomicU8::new(BreakerState::Closed as u8),
            next_retry_ms: AtomicU64::new(0),
            observers,
        }
    }

    pub(crate) fn rule(&self) -> &Arc<DegradeRule> {
        &self.rule
    }

    pub(crate) fn state(&self) -> BreakerState {
        BreakerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn cas_state(&self, from: BreakerState, to: BreakerState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn retry_timeout_arrived(&self, now_ms: u64) -> bool {
        now_ms >= self.next_retry_ms.load(Ordering::Acquire)
    }

    /// Every transition into `Open` re-arms the retry deadline, so it
    /// strictly increases under the monotone clock.
    fn arm_retry(&self, now_ms: u64) {
        self.next_retry_ms
            .store(now_ms + self.recovery_ms, Ordering::Release);
    }

    fn notify(&self, prev: BreakerState, next: BreakerState, snapshot: Option<f64>) {
        info!(
            resource = %self.rule.resource,
            ?prev,
            ?next,
            snapshot,
            "circuit breaker state change"
        );
        self.observers.notify(prev, next, &self.rule, snapshot);
    }

    pub(crate) fn from_closed_to_open(&self, now_ms: u64, snapshot: f64) -> bool {
        if self.cas_state(BreakerState::Closed, BreakerState::Open) {
            self.arm_retry(now_ms);
            self.notify(BreakerState::Closed, BreakerState::Open, Some(snapshot));
            return true;
        }
        false
    }

    pub(crate) fn from_half_open_to_open(&self, now_ms: u64, snapshot: f64) -> bool {
        if self.cas_state(BreakerState::HalfOpen, BreakerState::Open) {
            self.arm_retry(now_ms);
            self.notify(BreakerState::HalfOpen, BreakerState::Open, Some(snapshot));
            return true;
        }
        false
    }

    /// Caller resets its statistics when this succeeds.
    pub(crate) fn from_half_open_to_closed(&self) -> bool {
        if self.cas_state(BreakerState::HalfOpen, BreakerState::Closed) {
            self.notify(BreakerState::HalfOpen, BreakerState::Closed, None);
            return true;
        }
        false
    }

    pub(crate) fn transform_to_open(&self, now_ms: u64, snapshot: f64) {
        match self.state() {
            BreakerState::Closed => {
                self.from_closed_to_open(now_ms, snapshot);
            }
            BreakerState::HalfOpen => {
                self.from_half_open_to_open(now_ms, snapshot);
            }
            BreakerState::Open => {}
        }
    }
}

/// Shared `try_pass` template.
///
/// Open admits a single probe once the retry deadline arrives; the winning
/// CAS registers a terminate hook on the probe entry: if the probe ends
/// with a block error from a downstream rule, the breaker falls straight
/// back to Open (its statistics untouched) because the probe never
/// exercised the protected call.
pub(crate) fn try_pass_shared(
    shared: &Arc<BreakerShared>,
    entry: &mut Entry,
    now_ms: u64,
) -> bool {
    match shared.state() {
        BreakerState::Closed => true,
        BreakerState::Open => {
            shared.retry_timeout_arrived(now_ms) && open_to_half_open(shared, entry)
        }
        // Only one probe in flight.
        BreakerState::HalfOpen => false,
    }
}

fn open_to_half_open(shared: &Arc<BreakerShared>, entry: &mut Entry) -> bool {
    if !shared.cas_state(BreakerState::Open, BreakerState::HalfOpen) {
        return false;
    }
    shared.notify(BreakerState::Open, BreakerState::HalfOpen, None);

    let hook_shared = Arc::clone(shared);
    entry.on_terminate(Box::new(move |entry: &Entry, terminate_now_ms: u64| {
        if entry.block_error().is_some()
            && hook_shared.cas_state(BreakerState::HalfOpen, BreakerState::Open)
        {
            hook_shared.arm_retry(terminate_now_ms);
            hook_shared.notify(BreakerState::HalfOpen, BreakerState::Open, Some(1.0));
        }
    }));
    true
}
