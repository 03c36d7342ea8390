//! `Port` — the owner of one queue and the set of endpoints attached to
//! it, one per peer port.
//!
//! Modeled on the peer map in `monocoque-core/src/router.rs`'s
//! `RouterHub` (`HashMap<RoutingId, Sender<PeerCmd>>`), generalized from
//! "route to a channel" to "hold an endpoint trait object" — a `Port`
//! doesn't know or care whether a given peer is reached locally or over
//! a tunnel, only that `Box<dyn Endpoint>` moves tokens for it.

use hashbrown::HashMap;
use tracing::debug;

use dataflow_core::ids::PortId;
use dataflow_core::options::QueueOptions;
use dataflow_core::token::Token;

use crate::endpoint::{Endpoint, LocalPeerEndpoint};
use crate::queue_handle::{QueueHandle, QueueHandleSnapshot};

/// How a disconnect should treat tokens still buffered for a peer
/// (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminate {
    /// Keep the queue and positions untouched; a reconnect is expected
    /// to resume at the first uncommitted sequence number.
    Temporary,
    /// Drop the endpoint and its buffered tokens outright.
    Terminate,
    /// Flush in-flight tokens to the peer before dropping.
    Exhaust,
    /// Accept the peer's in-flight tokens and drop.
    ExhaustPeer,
}

/// An endpoint removed by `disconnect`, carrying whatever it hadn't
/// finished delivering.
pub struct RemovedEndpoint {
    pub peer: PortId,
    pub remaining_tokens: Vec<Token>,
}

/// Owns a queue and the table of attached peer endpoints.
pub struct Port {
    id: PortId,
    queue: QueueHandle,
    endpoints: HashMap<PortId, Box<dyn Endpoint>>,
}

impl Port {
    /// A port backed by a fanout (broadcast) queue.
    #[must_use]
    pub fn new(id: PortId, options: QueueOptions) -> Self {
        Self {
            id,
            queue: QueueHandle::fanout(options),
            endpoints: HashMap::new(),
        }
    }

    /// A port backed by a round-robin (load-balanced) queue.
    #[must_use]
    pub fn with_round_robin(id: PortId, options: QueueOptions) -> Self {
        Self {
            id,
            queue: QueueHandle::round_robin(options),
            endpoints: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> PortId {
        self.id
    }

    #[must_use]
    pub fn queue(&self) -> &QueueHandle {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut QueueHandle {
        &mut self.queue
    }

    /// Attach an endpoint, giving its peer a reader slot on the queue.
    ///
    /// Returns the endpoint this peer previously had attached, if any,
    /// so the caller can `detach` it before dropping it (spec §4.4:
    /// `attach_endpoint(e) -> displaced_endpoint_or_null`).
    pub fn attach_endpoint(&mut self, endpoint: Box<dyn Endpoint>) -> Option<Box<dyn Endpoint>> {
        let peer = endpoint.peer();
        self.queue.add_reader(peer);
        let displaced = self.endpoints.insert(peer, endpoint);
        debug!(port = %self.id, %peer, displaced = displaced.is_some(), "[PORT] attach_endpoint");
        displaced
    }

    /// Attach a bare local peer, giving it a reader slot on the queue.
    /// Sugar over [`Port::attach_endpoint`] for the common case where
    /// the caller doesn't need to hold onto the displaced endpoint.
    /// Returns `true` if this peer wasn't already attached.
    pub fn attach(&mut self, peer: PortId) -> bool {
        self.attach_endpoint(Box::new(LocalPeerEndpoint::new(peer))).is_none()
    }

    /// Detach the listed peers per `terminate` semantics, returning the
    /// removed endpoints and whatever they hadn't finished delivering.
    ///
    /// `Exhaust`/`ExhaustPeer` drain remaining tokens into the returned
    /// list rather than discarding them, so the caller (`Connection`)
    /// can fold them into the peer's own queue via
    /// [`Port::exhausted_tokens`].
    pub fn disconnect(&mut self, peers: &[PortId], terminate: Terminate) -> Vec<RemovedEndpoint> {
        let mut removed = Vec::with_capacity(peers.len());
        for &peer in peers {
            let Some(mut endpoint) = self.endpoints.remove(&peer) else {
                continue;
            };
            endpoint.detach(&mut self.queue);
            let remaining_tokens = match terminate {
                Terminate::Temporary => {
                    // queue and positions stay untouched; the reader
                    // slot itself is not removed so a reconnect resumes
                    // at the first uncommitted sequence number.
                    self.endpoints.insert(peer, endpoint);
                    Vec::new()
                }
                Terminate::Terminate => {
                    self.queue.remove_reader(peer);
                    Vec::new()
                }
                Terminate::Exhaust | Terminate::ExhaustPeer => {
                    let mut drained = Vec::new();
                    while let Ok(token) = self.queue.peek(peer) {
                        drained.push(token);
                        let _ = self.queue.commit(peer);
                    }
                    self.queue.remove_reader(peer);
                    drained
                }
            };
            debug!(
                port = %self.id,
                %peer,
                ?terminate,
                drained = remaining_tokens.len(),
                "[PORT] disconnect"
            );
            removed.push(RemovedEndpoint { peer, remaining_tokens });
        }
        removed
    }

    /// Receive leftover tokens from a disconnected peer's endpoint and
    /// inject them back into this port's queue for redelivery.
    ///
    /// # Errors
    /// Returns an error if the queue has no room for all of `residual`.
    pub fn exhausted_tokens(&mut self, residual: Vec<Token>) -> dataflow_core::error::CoreResult<()> {
        for token in residual {
            self.queue.write(token)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn snapshot(&self) -> QueueHandleSnapshot {
        self.queue.snapshot()
    }

    /// Restore this port's queue state from a migration snapshot.
    ///
    /// # Errors
    /// Returns an error if `snapshot`'s queue kind or ring capacity
    /// doesn't match this port's own (spec §6).
    pub fn restore(&mut self, snapshot: &QueueHandleSnapshot) -> dataflow_core::error::CoreResult<()> {
        self.queue.restore_into(snapshot)
    }
}
