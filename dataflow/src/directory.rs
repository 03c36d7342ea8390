//! Best-effort directory of port placement, used to look up which node
//! and actor currently own a port before opening a tunnel connection.
//!
//! Spec §6: `port_<port_id> -> {node_id, actor_id, exhausting_peers?}`.
//! Modeled as a small in-process table the way
//! `calvin/runtime/north/plugins/storage/storage_dict_local.py` backs
//! the real runtime's directory — a plain key/value map, generalized
//! here from Python's dynamically-typed values to an explicit
//! `DirectoryValue` enum. `storage_dict_local.py`'s `get_concat`/`remove`
//! use `list()` as a class check to decide whether a stored value is
//! list-typed; the equivalent bug has no Rust analogue since
//! `DirectoryValue::List` is matched directly, never guessed at.

use hashbrown::HashMap;
use tracing::debug;

use dataflow_core::ids::{ActorId, NodeId, PortId};

/// A value stored in the directory: either a single port record or a
/// list (used for `exhausting_peers`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryValue {
    Record(PortRecord),
    List(Vec<PortId>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRecord {
    pub node_id: NodeId,
    pub actor_id: ActorId,
    pub exhausting_peers: Vec<PortId>,
}

/// In-process directory keyed by port id.
#[derive(Debug, Default)]
pub struct Directory {
    records: HashMap<PortId, PortRecord>,
}

impl Directory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_port(&mut self, port: PortId, node_id: NodeId, actor_id: ActorId) {
        debug!(%port, %node_id, %actor_id, "[DIRECTORY] publish");
        self.records.insert(
            port,
            PortRecord {
                node_id,
                actor_id,
                exhausting_peers: Vec::new(),
            },
        );
    }

    #[must_use]
    pub fn lookup(&self, port: PortId) -> Option<&PortRecord> {
        self.records.get(&port)
    }

    pub fn remove_port(&mut self, port: PortId) -> Option<PortRecord> {
        self.records.remove(&port)
    }

    /// Append a peer to the `exhausting_peers` list for `port`.
    ///
    /// Returns `false` if `port` has no record (matches the original's
    /// "missing key is a silent no-op" directory semantics).
    pub fn add_exhausting_peer(&mut self, port: PortId, peer: PortId) -> bool {
        match self.records.get_mut(&port) {
            Some(record) => {
                record.exhausting_peers.push(peer);
                true
            }
            None => false,
        }
    }

    /// Fetch the `exhausting_peers` list for `port`, or an empty list
    /// if the key doesn't exist or has no peers recorded yet.
    #[must_use]
    pub fn exhausting_peers(&self, port: PortId) -> Vec<PortId> {
        self.records
            .get(&port)
            .map(|r| r.exhausting_peers.clone())
            .unwrap_or_default()
    }

    pub fn clear_exhausting_peers(&mut self, port: PortId) {
        if let Some(record) = self.records.get_mut(&port) {
            record.exhausting_peers.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_then_lookup() {
        let mut dir = Directory::new();
        let port = PortId::new();
        let node = NodeId::new();
        let actor = ActorId::new();
        dir.publish_port(port, node, actor);
        let record = dir.lookup(port).unwrap();
        assert_eq!(record.node_id, node);
        assert_eq!(record.actor_id, actor);
    }

    #[test]
    fn exhausting_peers_round_trip() {
        let mut dir = Directory::new();
        let port = PortId::new();
        dir.publish_port(port, NodeId::new(), ActorId::new());
        let peer = PortId::new();
        assert!(dir.add_exhausting_peer(port, peer));
        assert_eq!(dir.exhausting_peers(port), vec![peer]);
        dir.clear_exhausting_peers(port);
        assert!(dir.exhausting_peers(port).is_empty());
    }

    #[test]
    fn add_exhausting_peer_on_unknown_port_is_a_noop() {
        let mut dir = Directory::new();
        assert!(!dir.add_exhausting_peer(PortId::new(), PortId::new()));
    }

    #[test]
    fn lookup_on_removed_port_returns_none() {
        let mut dir = Directory::new();
        let port = PortId::new();
        dir.publish_port(port, NodeId::new(), ActorId::new());
        dir.remove_port(port);
        assert!(dir.lookup(port).is_none());
    }
}
