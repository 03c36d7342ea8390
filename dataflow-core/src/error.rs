//! Dataflow Core Error Types
//!
//! Error handling for queue and token operations. See spec §7 for the
//! propagation policy: `QueueFull` and `QueueEmpty` are expected control
//! flow at the call sites that use them (flow control / scheduler polling)
//! and are never logged as errors; `ProtocolInvalid` and `PeerRefused`
//! propagate up to a connection's completion callback.

use thiserror::Error;

use crate::ids::PortId;

/// Errors raised by `FanoutFifo`/`RoundRobinFifo` and the endpoints built
/// on top of them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The slowest reader has not advanced enough to make room for a write.
    #[error("queue is full")]
    QueueFull,

    /// A reader has no new tokens available.
    #[error("queue is empty for reader {0}")]
    QueueEmpty(PortId),

    /// An operation referenced a reader id that was never added.
    #[error("unknown reader {0}")]
    UnknownReader(PortId),

    /// A wire message referenced a sequence number outside the valid
    /// range (more than one past `write_pos`, or a commit/cancel outside
    /// `[read_pos, tentative_read_pos]`).
    #[error("protocol violation: sequence number out of range")]
    ProtocolInvalid,

    /// The tunnel to the peer node is not currently reachable. Tokens stay
    /// queued; this is not fatal.
    #[error("tunnel unavailable")]
    TunnelUnavailable,

    /// The peer refused a connect/attach request.
    #[error("peer refused connection")]
    PeerRefused,
}

/// Result type alias for dataflow-core operations.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// `QueueFull`/`QueueEmpty`/`TunnelUnavailable` are recoverable:
    /// the caller retries later, nothing is corrupted.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::QueueFull | Self::QueueEmpty(_) | Self::TunnelUnavailable
        )
    }

    /// Errors that must be surfaced to a connection's completion callback
    /// rather than handled locally (spec §7).
    #[must_use]
    pub const fn is_connection_fatal(&self) -> bool {
        matches!(self, Self::ProtocolInvalid | Self::PeerRefused)
    }
}
