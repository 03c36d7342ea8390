//! Live actor migration: moving a port's queue state from one node to
//! another without losing or duplicating in-flight tokens.
//!
//! `original_source` carries no dedicated migration module in its
//! 7-file extract, but `fanout_fifo.py`'s `_state`/`_set_state` pair —
//! the hooks the original runtime calls immediately before and after
//! moving an actor — is the full snapshot contract footprint; this
//! mirrors that shape field-for-field via
//! [`crate::queue_handle::QueueHandleSnapshot`].

use tracing::{debug, warn};

use dataflow_core::error::{CoreError, CoreResult};

use crate::port::Port;
use crate::queue_handle::QueueHandleSnapshot;

/// Snapshot a port for migration to another node.
///
/// # Errors
/// Never fails; kept fallible for symmetry with [`restore`].
pub fn snapshot(port: &Port) -> CoreResult<QueueHandleSnapshot> {
    Ok(port.snapshot())
}

/// Restore a port's queue state from a snapshot taken on another node.
///
/// Rejects a snapshot whose queue kind or ring capacity `N` differs
/// from `port`'s own — migrating between a fanout and a round-robin
/// port, or between differently-sized queues, is not supported (spec
/// §6).
///
/// # Errors
/// Returns `CoreError::ProtocolInvalid` on a kind/capacity mismatch or
/// a malformed snapshot.
pub fn restore(port: &mut Port, snapshot: &QueueHandleSnapshot) -> CoreResult<()> {
    let malformed = match snapshot {
        QueueHandleSnapshot::Fanout(s) => s.fifo.len() != s.n + 1,
        QueueHandleSnapshot::RoundRobin(s) => s.fifo.len() != s.n + 1,
    };
    if malformed {
        warn!(port = %port.id(), "[MIGRATION] rejecting malformed snapshot");
        return Err(CoreError::ProtocolInvalid);
    }
    debug!(port = %port.id(), "[MIGRATION] restoring snapshot");
    port.restore(snapshot)
}
