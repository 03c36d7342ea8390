//! The seam between this crate's endpoints and actual node-to-node I/O.
//!
//! The transport core is sans-IO (spec §5: "no explicit awaits inside
//! the transport core"): `TunnelOutEndpoint` never opens a socket
//! itself. It hands encoded bytes to a `TunnelTransport` implementation
//! supplied by the embedding runtime, the same separation
//! `ZmtpSession` drew between protocol state machine and the stream it
//! rides on.

use dataflow_core::error::CoreResult;
use dataflow_core::ids::NodeId;

/// Non-blocking delivery of raw tunnel bytes to a peer node.
///
/// Implementations must not block the calling thread; if the link is
/// saturated they should return `Err(CoreError::TunnelUnavailable)` so
/// the endpoint can apply backoff rather than stall the scheduler.
pub trait TunnelTransport: Send {
    /// Best-effort, non-blocking send of one encoded message to `peer`.
    ///
    /// # Errors
    /// Returns `CoreError::TunnelUnavailable` if the link to `peer` is
    /// down or momentarily saturated.
    fn send(&self, peer: NodeId, bytes: &[u8]) -> CoreResult<()>;
}
