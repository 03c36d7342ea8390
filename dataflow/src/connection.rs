//! `Connection` — orchestrates connect/disconnect/migration between a
//! pair of ports, firing a completion callback once every sibling in
//! its parallel group has finished.
//!
//! Grounded in `calvin/runtime/north/plugins/port/connection/local.py`'s
//! `LocalConnection` (`_parallel_connections` bookkeeping: the last
//! sibling to complete fires the shared callback) and in
//! `monocoque-zmtp/src/session.rs`'s sans-IO shape: no `async`/`await`
//! anywhere, progress is driven by explicit events fed into `on_reply`.

use std::rc::Rc;
use std::cell::RefCell;

use tracing::{debug, warn};

use dataflow_core::error::CoreError;
use dataflow_core::ids::{NodeId, PortId};

use crate::error::ConnectError;

/// Outcome handed to a `Connection`'s completion callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectResult {
    Connected,
    Disconnected,
    Failed(ConnectErrorKind),
}

/// Mirrors `ConnectError`'s variants without carrying the error's
/// non-`Clone` internals, so it can sit inside a `ConnectResult` that
/// gets cloned into callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectErrorKind {
    ProtocolInvalid,
    PeerRefused,
}

impl From<&CoreError> for ConnectErrorKind {
    fn from(e: &CoreError) -> Self {
        match e {
            CoreError::PeerRefused => Self::PeerRefused,
            _ => Self::ProtocolInvalid,
        }
    }
}

/// State of one connection attempt, independent of whether the peer is
/// local or reached over a tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Pending,
    Active,
    Disconnected,
}

/// Which kind of endpoint pair this connection manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Both ports live on this node; pumped directly, no ACK round trip.
    Local,
    /// Peer port lives on `NodeId`; pumped through a tunnel endpoint
    /// pair with ACK/NACK flow control.
    Tunnel(NodeId),
}

/// Shared completion state for a group of sibling connections that
/// must all finish before a caller's callback fires — mirrors
/// `_parallel_connections` in `local.py`.
struct ParallelGroup {
    remaining: RefCell<usize>,
    callback: RefCell<Option<Box<dyn FnOnce(ConnectResult)>>>,
}

impl ParallelGroup {
    fn new(size: usize, callback: Box<dyn FnOnce(ConnectResult)>) -> Rc<Self> {
        Rc::new(Self {
            remaining: RefCell::new(size),
            callback: RefCell::new(Some(callback)),
        })
    }

    /// Called once by each sibling as it finishes. The last sibling to
    /// call this fires the shared callback.
    fn complete_one(&self, result: ConnectResult) {
        let mut remaining = self.remaining.borrow_mut();
        *remaining -= 1;
        if *remaining == 0 {
            if let Some(cb) = self.callback.borrow_mut().take() {
                cb(result);
            }
        }
    }
}

/// One connection between a local port and a peer, local or tunneled.
pub struct Connection {
    local_port: PortId,
    peer_port: PortId,
    kind: ConnectionKind,
    state: ConnectionState,
    group: Rc<ParallelGroup>,
}

impl Connection {
    /// Build a group of sibling connections sharing one completion
    /// callback, the way `local.py` pairs a port's connect call across
    /// every peer it's fanning out to at once.
    #[must_use]
    pub fn parallel_group(
        pairs: Vec<(PortId, PortId, ConnectionKind)>,
        callback: Box<dyn FnOnce(ConnectResult)>,
    ) -> Vec<Self> {
        let group = ParallelGroup::new(pairs.len(), callback);
        pairs
            .into_iter()
            .map(|(local_port, peer_port, kind)| Self {
                local_port,
                peer_port,
                kind,
                state: ConnectionState::Pending,
                group: Rc::clone(&group),
            })
            .collect()
    }

    #[must_use]
    pub const fn local_port(&self) -> PortId {
        self.local_port
    }

    #[must_use]
    pub const fn peer_port(&self) -> PortId {
        self.peer_port
    }

    #[must_use]
    pub const fn kind(&self) -> ConnectionKind {
        self.kind
    }

    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Mark this connection active. `Local` connections complete
    /// synchronously (no peer round trip); `Tunnel` connections call
    /// this once the peer has acknowledged attach.
    pub fn mark_connected(&mut self) {
        self.state = ConnectionState::Active;
        debug!(local = %self.local_port, peer = %self.peer_port, kind = ?self.kind, "[CONNECTION] connected");
        self.group.complete_one(ConnectResult::Connected);
    }

    /// Mark this connection disconnected, firing the group callback
    /// once every sibling has reported in.
    pub fn mark_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.group.complete_one(ConnectResult::Disconnected);
    }

    /// Fail this connection. `ProtocolInvalid`/`PeerRefused` are the
    /// only `CoreError`s that propagate here rather than being
    /// swallowed into flow control (spec §7).
    ///
    /// # Errors
    /// Returns the `ConnectError` that should be surfaced to whatever
    /// called `parallel_group`, after also notifying the group.
    pub fn fail(&mut self, error: &CoreError) -> ConnectError {
        self.state = ConnectionState::Disconnected;
        warn!(local = %self.local_port, peer = %self.peer_port, %error, "[CONNECTION] failed");
        self.group
            .complete_one(ConnectResult::Failed(ConnectErrorKind::from(error)));
        ConnectError::from(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn single_connection_fires_callback_immediately() {
        let fired = Rc::new(Cell::new(false));
        let fired_cb = Rc::clone(&fired);
        let mut conns = Connection::parallel_group(
            vec![(PortId::new(), PortId::new(), ConnectionKind::Local)],
            Box::new(move |r| {
                assert_eq!(r, ConnectResult::Connected);
                fired_cb.set(true);
            }),
        );
        conns[0].mark_connected();
        assert!(fired.get());
    }

    #[test]
    fn callback_only_fires_after_last_sibling_completes() {
        let fired = Rc::new(Cell::new(false));
        let fired_cb = Rc::clone(&fired);
        let mut conns = Connection::parallel_group(
            vec![
                (PortId::new(), PortId::new(), ConnectionKind::Local),
                (PortId::new(), PortId::new(), ConnectionKind::Tunnel(NodeId::new())),
            ],
            Box::new(move |_| fired_cb.set(true)),
        );
        conns[0].mark_connected();
        assert!(!fired.get());
        conns[1].mark_connected();
        assert!(fired.get());
    }

    #[test]
    fn protocol_invalid_surfaces_as_connect_error() {
        let mut conns = Connection::parallel_group(
            vec![(PortId::new(), PortId::new(), ConnectionKind::Local)],
            Box::new(|_| {}),
        );
        let err = conns[0].fail(&CoreError::ProtocolInvalid);
        assert!(matches!(err, ConnectError::Protocol));
    }
}
