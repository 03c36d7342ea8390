//! Local endpoints: a direct, in-process pump between two queues on
//! the same node. No ACK/NACK round trip is needed — both ends run in
//! the same cooperative scheduler, so a committed read on one side and
//! a successful write on the other side happen atomically from the
//! perspective of anyone outside this module.
//!
//! Grounded in `calvin/runtime/north/plugins/port/endpoint/local.py`'s
//! `LocalInEndpoint`/`LocalOutEndpoint`, simplified from this crate's
//! sibling workspace's split read/write actor pump (`actor.rs`) down to
//! a single synchronous step since there is no async I/O boundary to
//! cross locally.

use dataflow_core::error::{CoreError, CoreResult};
use dataflow_core::ids::PortId;
use dataflow_core::queue::FanoutFifo;
use dataflow_core::round_robin::RoundRobinFifo;
use dataflow_core::token::Token;

/// The reader-side protocol `LocalEndpoint` needs from either queue
/// kind it might be pumping between. `write`'s return is normalized to
/// `CoreResult<()>` so a `LocalEndpoint` doesn't care that
/// `RoundRobinFifo::write` additionally reports which reader a token
/// landed on — that choice is the destination queue's own business.
pub trait TransferQueue {
    fn peek(&mut self, reader: PortId) -> CoreResult<Token>;
    fn commit(&mut self, reader: PortId) -> CoreResult<()>;
    fn cancel(&mut self, reader: PortId) -> CoreResult<()>;
    fn write(&mut self, token: Token) -> CoreResult<()>;
}

impl TransferQueue for FanoutFifo {
    fn peek(&mut self, reader: PortId) -> CoreResult<Token> {
        Self::peek(self, reader)
    }
    fn commit(&mut self, reader: PortId) -> CoreResult<()> {
        Self::commit(self, reader)
    }
    fn cancel(&mut self, reader: PortId) -> CoreResult<()> {
        Self::cancel(self, reader)
    }
    fn write(&mut self, token: Token) -> CoreResult<()> {
        Self::write(self, token)
    }
}

impl TransferQueue for RoundRobinFifo {
    fn peek(&mut self, reader: PortId) -> CoreResult<Token> {
        Self::peek(self, reader)
    }
    fn commit(&mut self, reader: PortId) -> CoreResult<()> {
        Self::commit(self, reader)
    }
    fn cancel(&mut self, reader: PortId) -> CoreResult<()> {
        Self::cancel(self, reader)
    }
    fn write(&mut self, token: Token) -> CoreResult<()> {
        Self::write(self, token).map(|_reader| ())
    }
}

/// Pumps tokens from one reader of a source queue directly into a
/// destination queue, committing the read only once the write
/// succeeds. Generic over `TransferQueue` so either a fanout or a
/// round-robin queue can sit on each side.
pub struct LocalEndpoint {
    source_reader: PortId,
}

impl LocalEndpoint {
    #[must_use]
    pub const fn new(source_reader: PortId) -> Self {
        Self { source_reader }
    }

    /// Move as many tokens as possible from `source` to `dest` without
    /// blocking. Returns the number of tokens moved.
    ///
    /// # Errors
    /// Propagates any error other than the destination being full or
    /// the source being empty, both of which are expected steady-state
    /// conditions and simply stop the pump for this call.
    pub fn pump(
        &self,
        source: &mut impl TransferQueue,
        dest: &mut impl TransferQueue,
    ) -> CoreResult<usize> {
        let mut moved = 0;
        loop {
            let token = match source.peek(self.source_reader) {
                Ok(token) => token,
                Err(CoreError::QueueEmpty(_)) => break,
                Err(e) => return Err(e),
            };
            match dest.write(token) {
                Ok(()) => {
                    source.commit(self.source_reader)?;
                    moved += 1;
                }
                Err(CoreError::QueueFull) => {
                    source.cancel(self.source_reader)?;
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataflow_core::options::QueueOptions;
    use dataflow_core::token::Token;

    #[test]
    fn pumps_all_available_tokens_when_room_allows() {
        let mut src = FanoutFifo::new(QueueOptions::default().with_capacity(8));
        let mut dst = FanoutFifo::new(QueueOptions::default().with_capacity(8));
        let reader = PortId::new();
        src.add_reader(reader);
        dst.add_reader(PortId::new());
        for i in 0..3 {
            src.write(Token::new(i)).unwrap();
        }
        let ep = LocalEndpoint::new(reader);
        let moved = ep.pump(&mut src, &mut dst).unwrap();
        assert_eq!(moved, 3);
        assert!(src.com_is_committed(reader).unwrap());
    }

    #[test]
    fn stops_and_cancels_tentative_reads_when_destination_fills_up() {
        let mut src = FanoutFifo::new(QueueOptions::default().with_capacity(8));
        let mut dst = FanoutFifo::new(QueueOptions::default().with_capacity(1));
        let src_reader = PortId::new();
        let dst_reader = PortId::new();
        src.add_reader(src_reader);
        dst.add_reader(dst_reader);
        for i in 0..3 {
            src.write(Token::new(i)).unwrap();
        }
        let ep = LocalEndpoint::new(src_reader);
        let moved = ep.pump(&mut src, &mut dst).unwrap();
        assert_eq!(moved, 1);
        // the un-movable peek was cancelled, not left dangling tentative.
        assert!(src.com_is_committed(src_reader).unwrap());
    }
}
