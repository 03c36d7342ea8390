//! `RoundRobinFifo` — a sequenced ring buffer that load-balances writes
//! across readers instead of fanning them out to all of them.
//!
//! Shares its ring-buffer storage and sequence-number protocol with
//! [`crate::queue::FanoutFifo`], but each write is assigned to exactly
//! one reader, chosen by `write_ordinal mod |readers|` at write time.
//! The assignment is frozen into the slot so that migration (readers
//! added/removed, or moved between nodes) never reshuffles a token that
//! has already been queued. Grounded in the self-healing peer rotation
//! of `RouterHub::pick_rr_peer` (`lb_list`/`lb_cursor`) from this
//! crate's sibling workspace, generalized from "pick the next live
//! peer" to "remember which peer was picked, forever, for this token".

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::trace;

use crate::error::{CoreError, CoreResult};
use crate::ids::PortId;
use crate::options::QueueOptions;
use crate::queue::ComResponse;
use crate::token::Token;

#[derive(Debug, Clone)]
struct Slot {
    token: Token,
    reader: PortId,
}

/// Wire/migration-portable snapshot of a `RoundRobinFifo`'s full state,
/// mirroring `FanoutFifo`'s `QueueSnapshot` but carrying each slot's
/// frozen reader assignment and the rotation cursor (spec §4.1: "migration
/// preserves per-reader backlog").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRobinSnapshot {
    pub queuetype: String,
    pub fifo: Vec<Option<(PortId, serde_json::Value)>>,
    pub n: usize,
    pub write_pos: u64,
    pub write_ordinal: u64,
    pub lb_list: Vec<PortId>,
    pub read_pos: HashMap<PortId, u64>,
    pub tentative_read_pos: HashMap<PortId, u64>,
}

/// A sequenced ring buffer where each token is delivered to exactly one
/// reader, assigned round-robin over the stable reader order.
#[derive(Debug, Clone)]
pub struct RoundRobinFifo {
    fifo: Vec<Option<Slot>>,
    n: usize,
    write_pos: u64,
    write_ordinal: u64,
    /// Stable reader order used to compute `write_ordinal mod len`.
    /// `router.rs`'s `lb_list` plays the same role: a cursor only
    /// advances through peers actually present at assignment time.
    lb_list: SmallVec<[PortId; 4]>,
    read_pos: HashMap<PortId, u64>,
    tentative_read_pos: HashMap<PortId, u64>,
}

impl RoundRobinFifo {
    #[must_use]
    pub fn new(options: QueueOptions) -> Self {
        let n = options.capacity;
        Self {
            fifo: vec![None; n + 1],
            n,
            write_pos: 0,
            write_ordinal: 0,
            lb_list: SmallVec::new(),
            read_pos: HashMap::new(),
            tentative_read_pos: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.n
    }

    pub fn add_reader(&mut self, reader: PortId) {
        if !self.lb_list.contains(&reader) {
            self.lb_list.push(reader);
        }
        self.read_pos.entry(reader).or_insert(0);
        self.tentative_read_pos.entry(reader).or_insert(0);
    }

    /// Remove a reader. Any slots already assigned to it stay assigned
    /// to it (and will never be delivered) — callers are expected to
    /// drain or migrate those slots before removal, mirroring the
    /// connection-teardown responsibility in `local.py`'s disconnect.
    pub fn remove_reader(&mut self, reader: PortId) {
        self.lb_list.retain(|r| *r != reader);
        self.read_pos.remove(&reader);
        self.tentative_read_pos.remove(&reader);
    }

    fn slot_in_flight_count(&self) -> u64 {
        let slowest = self
            .read_pos
            .values()
            .copied()
            .min()
            .unwrap_or(self.write_pos);
        self.write_pos - slowest
    }

    #[must_use]
    pub fn slots_available(&self, n: usize) -> bool {
        (self.n as u64).saturating_sub(self.slot_in_flight_count()) >= n as u64
    }

    fn assign(&self) -> CoreResult<PortId> {
        if self.lb_list.is_empty() {
            return Err(CoreError::ProtocolInvalid);
        }
        let idx = (self.write_ordinal % self.lb_list.len() as u64) as usize;
        Ok(self.lb_list[idx])
    }

    /// Append a token, assigning it to the next reader in rotation.
    /// Returns the chosen reader.
    pub fn write(&mut self, token: Token) -> CoreResult<PortId> {
        if !self.slots_available(1) {
            return Err(CoreError::QueueFull);
        }
        let reader = self.assign()?;
        let idx = (self.write_pos % (self.n as u64 + 1)) as usize;
        self.fifo[idx] = Some(Slot { token, reader });
        self.write_pos += 1;
        self.write_ordinal += 1;
        trace!(write_pos = self.write_pos, assigned = %reader, "[ROUND_ROBIN] wrote token");
        Ok(reader)
    }

    fn tentative_pos(&self, reader: PortId) -> CoreResult<u64> {
        self.tentative_read_pos
            .get(&reader)
            .copied()
            .ok_or(CoreError::UnknownReader(reader))
    }

    /// Count of not-yet-tentatively-read slots assigned to `reader`
    /// (scans forward from its tentative position; unassigned slots in
    /// between are skipped, not counted).
    pub fn tokens_available(&self, n: usize, reader: PortId) -> CoreResult<bool> {
        let mut pos = self.tentative_pos(reader)?;
        let mut found = 0usize;
        while pos < self.write_pos && found < n {
            let idx = (pos % (self.n as u64 + 1)) as usize;
            if let Some(slot) = &self.fifo[idx] {
                if slot.reader == reader {
                    found += 1;
                }
            }
            pos += 1;
        }
        Ok(found >= n)
    }

    /// Read the next slot assigned to `reader`, advancing its tentative
    /// position past any intervening slots assigned to other readers.
    /// Returns the slot's own position in the shared sequence space
    /// alongside the token — that global position, not the reader's
    /// pre-advance cursor, is what `com_commit`/`com_cancel` key on.
    fn peek_with_seq(&mut self, reader: PortId) -> CoreResult<(u64, Token)> {
        let mut pos = self.tentative_pos(reader)?;
        loop {
            if pos >= self.write_pos {
                return Err(CoreError::QueueEmpty(reader));
            }
            let idx = (pos % (self.n as u64 + 1)) as usize;
            let slot = self.fifo[idx]
                .clone()
                .expect("written slot before write_pos always holds a value");
            let found_at = pos;
            pos += 1;
            *self.tentative_read_pos.get_mut(&reader).unwrap() = pos;
            if slot.reader == reader {
                return Ok((found_at, slot.token));
            }
            // not ours: skip silently, each reader's cursor advances
            // independently past slots assigned to other readers.
        }
    }

    pub fn peek(&mut self, reader: PortId) -> CoreResult<Token> {
        self.peek_with_seq(reader).map(|(_, token)| token)
    }

    /// Peek with the slot's global sequence number attached, for
    /// sending over the wire.
    pub fn com_peek(&mut self, reader: PortId) -> CoreResult<(u64, Token)> {
        self.peek_with_seq(reader)
    }

    pub fn commit(&mut self, reader: PortId) -> CoreResult<()> {
        let tentative = self.tentative_pos(reader)?;
        *self
            .read_pos
            .get_mut(&reader)
            .ok_or(CoreError::UnknownReader(reader))? = tentative;
        Ok(())
    }

    pub fn cancel(&mut self, reader: PortId) -> CoreResult<()> {
        let committed = *self
            .read_pos
            .get(&reader)
            .ok_or(CoreError::UnknownReader(reader))?;
        *self.tentative_read_pos.get_mut(&reader).unwrap() = committed;
        Ok(())
    }

    /// True iff no tentative reads are outstanding for `reader`.
    pub fn com_is_committed(&self, reader: PortId) -> CoreResult<bool> {
        let tentative = self.tentative_pos(reader)?;
        let committed = *self
            .read_pos
            .get(&reader)
            .ok_or(CoreError::UnknownReader(reader))?;
        Ok(tentative == committed)
    }

    // --- sequence-number protocol, mirroring FanoutFifo's shape ---------

    pub fn com_write(&mut self, token: Token, seq: u64) -> ComResponse {
        match seq.cmp(&self.write_pos) {
            std::cmp::Ordering::Equal => match self.write(token) {
                Ok(_) => ComResponse::Handled,
                Err(_) => ComResponse::Invalid,
            },
            std::cmp::Ordering::Less => ComResponse::Unhandled,
            std::cmp::Ordering::Greater => ComResponse::Invalid,
        }
    }

    /// Commit is keyed on the slot's own global position (as returned by
    /// `com_peek`), not a reader-local ordinal. Because slots not
    /// assigned to `reader` never generate a `seq` it could be asked to
    /// commit, advancing straight to `seq + 1` — rather than requiring
    /// strict `seq == committed` as `FanoutFifo` does — correctly skips
    /// over the interleaved positions that belong to other readers.
    pub fn com_commit(&mut self, reader: PortId, seq: u64) -> CoreResult<ComResponse> {
        let tentative = self.tentative_pos(reader)?;
        let committed = *self
            .read_pos
            .get(&reader)
            .ok_or(CoreError::UnknownReader(reader))?;
        if seq < committed {
            return Ok(ComResponse::Unhandled);
        }
        if seq >= tentative {
            return Ok(ComResponse::Invalid);
        }
        *self.read_pos.get_mut(&reader).unwrap() = seq + 1;
        Ok(ComResponse::Handled)
    }

    pub fn com_cancel(&mut self, reader: PortId, seq: u64) -> CoreResult<ComResponse> {
        let tentative = self.tentative_pos(reader)?;
        let committed = *self
            .read_pos
            .get(&reader)
            .ok_or(CoreError::UnknownReader(reader))?;
        if seq >= tentative || seq < committed {
            return Ok(ComResponse::Invalid);
        }
        *self.tentative_read_pos.get_mut(&reader).unwrap() = seq;
        Ok(ComResponse::Handled)
    }

    // --- migration -----------------------------------------------------

    /// Serialize full queue state for actor migration, preserving each
    /// slot's frozen reader assignment (spec §6).
    #[must_use]
    pub fn snapshot(&self) -> RoundRobinSnapshot {
        RoundRobinSnapshot {
            queuetype: "round_robin_fifo".to_string(),
            fifo: self
                .fifo
                .iter()
                .map(|s| s.as_ref().map(|s| (s.reader, s.token.encode())))
                .collect(),
            n: self.n,
            write_pos: self.write_pos,
            write_ordinal: self.write_ordinal,
            lb_list: self.lb_list.to_vec(),
            read_pos: self.read_pos.clone(),
            tentative_read_pos: self.tentative_read_pos.clone(),
        }
    }

    /// Restore from a snapshot. Rejects any divergence in ring size `N`
    /// between source and target, per spec §6.
    pub fn restore(snapshot: &RoundRobinSnapshot) -> CoreResult<Self> {
        if snapshot.fifo.len() != snapshot.n + 1 {
            return Err(CoreError::ProtocolInvalid);
        }
        Ok(Self {
            fifo: snapshot
                .fifo
                .iter()
                .map(|s| {
                    s.as_ref().map(|(reader, value)| Slot {
                        token: Token::from_value(value.clone()),
                        reader: *reader,
                    })
                })
                .collect(),
            n: snapshot.n,
            write_pos: snapshot.write_pos,
            write_ordinal: snapshot.write_ordinal,
            lb_list: snapshot.lb_list.iter().copied().collect(),
            read_pos: snapshot.read_pos.clone(),
            tentative_read_pos: snapshot.tentative_read_pos.clone(),
        })
    }

    /// Reject a restore whose configured capacity doesn't match this
    /// queue's own.
    pub fn restore_into(&mut self, snapshot: &RoundRobinSnapshot) -> CoreResult<()> {
        if snapshot.n != self.n {
            return Err(CoreError::ProtocolInvalid);
        }
        *self = Self::restore(snapshot)?;
        Ok(())
    }
}
