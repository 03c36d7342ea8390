//! The seam between this crate's periodic retransmission logic and the
//! embedding runtime's single-threaded event loop (spec §5).
//!
//! Nothing in `dataflow-wire` spawns a thread or sleeps. A `Monitor`
//! asks a `SchedulerHandle` to be woken up again later; the runtime
//! decides what "later" means (a timer wheel, an event-loop tick
//! count, whatever it already uses elsewhere).

use std::time::Duration;

/// Minimal scheduling contract a runtime must provide so a `Monitor`
/// can drive periodic retransmission without blocking.
pub trait SchedulerHandle: Send {
    /// Request a wakeup call to `Monitor::tick` no sooner than `after`.
    fn request_wakeup(&self, after: Duration);
}

/// A `SchedulerHandle` that does nothing; useful for endpoints driven
/// entirely by explicit `tick()` calls in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpScheduler;

impl SchedulerHandle for NoOpScheduler {
    fn request_wakeup(&self, _after: Duration) {}
}
