//! `Endpoint` — the abstract peer attachment a `Port` holds one of per
//! reader, whether that reader is driven directly in-process or over a
//! tunnel with its own ACK/NACK state machine.
//!
//! `dataflow-wire`'s `TunnelOutEndpoint` and a bare local peer attach
//! are both foreign to this trait's only two implementors here by
//! design: a `Port` shouldn't need to match on endpoint kind to know
//! whether it must be pumped by a `Monitor` or can be left alone.

use dataflow_core::ids::PortId;
use dataflow_wire::endpoint::TunnelOutEndpoint;

use crate::queue_handle::QueueHandle;

/// One peer attachment on a `Port`.
pub trait Endpoint {
    /// The peer reader this endpoint drives.
    fn peer(&self) -> PortId;

    /// Whether a `Monitor` needs to keep pumping this endpoint (tunnel
    /// endpoints do; a direct local attach is pumped synchronously by
    /// whoever calls `LocalEndpoint::pump` and needs no monitor).
    fn requires_monitor(&self) -> bool;

    /// Roll back whatever this endpoint had tentatively read from
    /// `queue` but never resolved, since it's about to be dropped or
    /// replaced and won't be the one to resolve it.
    fn detach(&mut self, queue: &mut QueueHandle);
}

/// A peer reached directly, in-process, no ACK round trip.
pub struct LocalPeerEndpoint {
    peer: PortId,
}

impl LocalPeerEndpoint {
    #[must_use]
    pub const fn new(peer: PortId) -> Self {
        Self { peer }
    }
}

impl Endpoint for LocalPeerEndpoint {
    fn peer(&self) -> PortId {
        self.peer
    }

    fn requires_monitor(&self) -> bool {
        false
    }

    fn detach(&mut self, queue: &mut QueueHandle) {
        let _ = queue.cancel(self.peer);
    }
}

/// A peer reached over a tunnel, driving a `TunnelOutEndpoint`'s
/// ACK/NACK flow control and adaptive backoff.
pub struct TunnelPeerEndpoint {
    peer: PortId,
    tunnel: TunnelOutEndpoint,
}

impl TunnelPeerEndpoint {
    #[must_use]
    pub const fn new(peer: PortId, tunnel: TunnelOutEndpoint) -> Self {
        Self { peer, tunnel }
    }

    #[must_use]
    pub const fn inner(&self) -> &TunnelOutEndpoint {
        &self.tunnel
    }

    pub fn inner_mut(&mut self) -> &mut TunnelOutEndpoint {
        &mut self.tunnel
    }
}

impl Endpoint for TunnelPeerEndpoint {
    fn peer(&self) -> PortId {
        self.peer
    }

    fn requires_monitor(&self) -> bool {
        true
    }

    fn detach(&mut self, queue: &mut QueueHandle) {
        let _ = queue.cancel(self.peer);
    }
}
