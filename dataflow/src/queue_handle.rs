//! `QueueHandle` — the queue kind a `Port` actually holds, fanout or
//! round-robin, behind one type so the rest of this crate (and the
//! tunnel/local endpoints in `dataflow-wire`) never needs to know which.
//!
//! Generalizes `Port`'s queue field from a hardcoded `FanoutFifo` so a
//! round-robin delivery port can flow through the same `Port`,
//! `Connection` and migration machinery as a fanout one.

use dataflow_core::error::CoreResult;
use dataflow_core::ids::PortId;
use dataflow_core::options::QueueOptions;
use dataflow_core::queue::{ComResponse, FanoutFifo, QueueSnapshot};
use dataflow_core::round_robin::{RoundRobinFifo, RoundRobinSnapshot};
use dataflow_core::token::Token;
use dataflow_wire::endpoint::{InboundQueue, OutboundQueue};
use dataflow_wire::local::TransferQueue;

/// Either queue kind a `Port` can own.
#[derive(Debug, Clone)]
pub enum QueueHandle {
    /// Broadcast delivery: every reader sees every token.
    Fanout(FanoutFifo),
    /// Load-balanced delivery: each token goes to exactly one reader.
    RoundRobin(RoundRobinFifo),
}

/// Migration-portable snapshot of either queue kind. Each variant's
/// payload is already `serde_json`-encodable on its own
/// (`dataflow_core::queue::QueueSnapshot` / `RoundRobinSnapshot`); this
/// wrapper only needs to exist in memory long enough to cross from one
/// `Port` to another, so it carries no `serde` derive of its own.
#[derive(Debug, Clone)]
pub enum QueueHandleSnapshot {
    Fanout(QueueSnapshot),
    RoundRobin(RoundRobinSnapshot),
}

impl QueueHandle {
    #[must_use]
    pub fn fanout(options: QueueOptions) -> Self {
        Self::Fanout(FanoutFifo::new(options))
    }

    #[must_use]
    pub fn round_robin(options: QueueOptions) -> Self {
        Self::RoundRobin(RoundRobinFifo::new(options))
    }

    pub fn add_reader(&mut self, reader: PortId) {
        match self {
            Self::Fanout(q) => q.add_reader(reader),
            Self::RoundRobin(q) => q.add_reader(reader),
        }
    }

    pub fn remove_reader(&mut self, reader: PortId) {
        match self {
            Self::Fanout(q) => q.remove_reader(reader),
            Self::RoundRobin(q) => q.remove_reader(reader),
        }
    }

    pub fn write(&mut self, token: Token) -> CoreResult<()> {
        match self {
            Self::Fanout(q) => q.write(token),
            Self::RoundRobin(q) => q.write(token).map(|_reader| ()),
        }
    }

    pub fn peek(&mut self, reader: PortId) -> CoreResult<Token> {
        match self {
            Self::Fanout(q) => q.peek(reader),
            Self::RoundRobin(q) => q.peek(reader),
        }
    }

    pub fn commit(&mut self, reader: PortId) -> CoreResult<()> {
        match self {
            Self::Fanout(q) => q.commit(reader),
            Self::RoundRobin(q) => q.commit(reader),
        }
    }

    pub fn cancel(&mut self, reader: PortId) -> CoreResult<()> {
        match self {
            Self::Fanout(q) => q.cancel(reader),
            Self::RoundRobin(q) => q.cancel(reader),
        }
    }

    #[must_use]
    pub fn slots_available(&self, n: usize) -> bool {
        match self {
            Self::Fanout(q) => q.slots_available(n),
            Self::RoundRobin(q) => q.slots_available(n),
        }
    }

    pub fn tokens_available(&self, n: usize, reader: PortId) -> CoreResult<bool> {
        match self {
            Self::Fanout(q) => q.tokens_available(n, reader),
            Self::RoundRobin(q) => q.tokens_available(n, reader),
        }
    }

    pub fn com_peek(&mut self, reader: PortId) -> CoreResult<(u64, Token)> {
        match self {
            Self::Fanout(q) => q.com_peek(reader),
            Self::RoundRobin(q) => q.com_peek(reader),
        }
    }

    pub fn com_commit(&mut self, reader: PortId, seq: u64) -> CoreResult<ComResponse> {
        match self {
            Self::Fanout(q) => q.com_commit(reader, seq),
            Self::RoundRobin(q) => q.com_commit(reader, seq),
        }
    }

    pub fn com_cancel(&mut self, reader: PortId, seq: u64) -> CoreResult<ComResponse> {
        match self {
            Self::Fanout(q) => q.com_cancel(reader, seq),
            Self::RoundRobin(q) => q.com_cancel(reader, seq),
        }
    }

    pub fn com_is_committed(&self, reader: PortId) -> CoreResult<bool> {
        match self {
            Self::Fanout(q) => q.com_is_committed(reader),
            Self::RoundRobin(q) => q.com_is_committed(reader),
        }
    }

    pub fn com_write(&mut self, token: Token, seq: u64) -> ComResponse {
        match self {
            Self::Fanout(q) => q.com_write(token, seq),
            Self::RoundRobin(q) => q.com_write(token, seq),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> QueueHandleSnapshot {
        match self {
            Self::Fanout(q) => QueueHandleSnapshot::Fanout(q.snapshot()),
            Self::RoundRobin(q) => QueueHandleSnapshot::RoundRobin(q.snapshot()),
        }
    }

    /// Restore in place from a snapshot taken of the same queue kind.
    ///
    /// # Errors
    /// Returns `CoreError::ProtocolInvalid` if `snapshot` is for the
    /// other queue kind or carries a mismatched capacity.
    pub fn restore_into(&mut self, snapshot: &QueueHandleSnapshot) -> CoreResult<()> {
        match (self, snapshot) {
            (Self::Fanout(q), QueueHandleSnapshot::Fanout(s)) => q.restore_into(s),
            (Self::RoundRobin(q), QueueHandleSnapshot::RoundRobin(s)) => q.restore_into(s),
            _ => Err(dataflow_core::error::CoreError::ProtocolInvalid),
        }
    }
}

impl OutboundQueue for QueueHandle {
    fn tokens_available(&self, n: usize, reader: PortId) -> CoreResult<bool> {
        Self::tokens_available(self, n, reader)
    }
    fn com_peek(&mut self, reader: PortId) -> CoreResult<(u64, Token)> {
        Self::com_peek(self, reader)
    }
    fn com_commit(&mut self, reader: PortId, seq: u64) -> CoreResult<ComResponse> {
        Self::com_commit(self, reader, seq)
    }
    fn com_cancel(&mut self, reader: PortId, seq: u64) -> CoreResult<ComResponse> {
        Self::com_cancel(self, reader, seq)
    }
    fn com_is_committed(&self, reader: PortId) -> CoreResult<bool> {
        Self::com_is_committed(self, reader)
    }
}

impl InboundQueue for QueueHandle {
    fn com_write(&mut self, token: Token, seq: u64) -> ComResponse {
        Self::com_write(self, token, seq)
    }
}

impl TransferQueue for QueueHandle {
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
