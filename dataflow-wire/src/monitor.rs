//! Periodic retransmission driver for tunnel endpoints in `Slow` mode.
//!
//! A `TunnelOutEndpoint` in `Slow` mode needs something to tell it when
//! its backoff interval has elapsed; this crate's transport core has no
//! timers of its own (spec §5), so `Monitor` asks a
//! [`crate::scheduler::SchedulerHandle`] for a wakeup and, when it
//! fires, calls back into the endpoint.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::endpoint::{OutboundQueue, TunnelOutEndpoint};
use crate::scheduler::SchedulerHandle;
use crate::transport::TunnelTransport;
use dataflow_core::error::CoreResult;

/// Drives one `TunnelOutEndpoint`'s retries and, while in `Bulk` mode,
/// its steady-state pumping.
pub struct Monitor<'a> {
    scheduler: &'a dyn SchedulerHandle,
}

impl<'a> Monitor<'a> {
    #[must_use]
    pub const fn new(scheduler: &'a dyn SchedulerHandle) -> Self {
        Self { scheduler }
    }

    /// Called by the embedding runtime whenever it's a reasonable time
    /// to make progress on `endpoint` (e.g. after its own backoff timer
    /// fired, or opportunistically on every event loop turn). All
    /// retransmission pacing lives inside `TunnelOutEndpoint::pump`
    /// itself; the monitor's only job is to supply the clock and ask
    /// for a wakeup when there's nothing left to send right now.
    pub fn tick(
        &self,
        endpoint: &mut TunnelOutEndpoint,
        queue: &mut impl OutboundQueue,
        transport: &dyn TunnelTransport,
    ) -> CoreResult<()> {
        let sent = endpoint.pump(queue, transport, Instant::now())?;
        if sent > 0 {
            trace!(sent, "[MONITOR] pumped tokens");
            return Ok(());
        }
        if endpoint.current_backoff() > 0.0 {
            trace!(backoff = endpoint.current_backoff(), "[MONITOR] requesting wakeup");
            self.scheduler
                .request_wakeup(Duration::from_secs_f64(endpoint.current_backoff()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::NoOpScheduler;
    use dataflow_core::ids::{NodeId, PortId};
    use dataflow_core::options::QueueOptions;
    use dataflow_core::queue::FanoutFifo;
    use dataflow_core::token::Token;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingTransport {
        sent: RefCell<usize>,
    }

    impl TunnelTransport for RecordingTransport {
        fn send(&self, _peer: NodeId, _bytes: &[u8]) -> CoreResult<()> {
            *self.sent.borrow_mut() += 1;
            Ok(())
        }
    }

    #[test]
    fn tick_pumps_and_resumes_after_nack_backoff() {
        let mut q = FanoutFifo::new(QueueOptions::default());
        let reader = PortId::new();
        q.add_reader(reader);
        q.write(Token::new(1)).unwrap();
        let mut out = TunnelOutEndpoint::new(reader, NodeId::new());
        let transport = RecordingTransport::default();
        let scheduler = NoOpScheduler;
        let monitor = Monitor::new(&scheduler);

        monitor.tick(&mut out, &mut q, &transport).unwrap();
        assert_eq!(*transport.sent.borrow(), 1);

        out.on_nack(&mut q, 0, std::time::Instant::now()).unwrap();
        monitor.tick(&mut out, &mut q, &transport).unwrap(); // slow mode's next_send_time was seeded to "now"
        assert_eq!(*transport.sent.borrow(), 2);
    }
}
