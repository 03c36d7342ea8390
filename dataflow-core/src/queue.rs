//! `FanoutFifo` — a sequence-numbered ring buffer with multiple
//! independent readers, supporting tentative and committed reads.
//!
//! This is the exactly-once delivery primitive described in spec §4.1:
//! every reader sees every token written (fanout, 1-to-N), in strict
//! ascending sequence order, with optimistic "tentative" reads that a
//! sender uses to form outbound wire messages before an ACK finally
//! commits them. Ported from the reader bookkeeping in
//! `calvin/runtime/north/plugins/port/queue/fanout_fifo.py`, with the
//! `com_cancel` guard corrected per the spec's design notes (the source
//! reads a nonexistent `self.reader_pos` there).

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{CoreError, CoreResult};
use crate::ids::PortId;
use crate::options::QueueOptions;
use crate::token::Token;

/// Outcome of a sequence-numbered write, commit or cancel (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComResponse {
    /// The operation was applied.
    Handled,
    /// A duplicate of an already-applied operation; treat as success.
    Unhandled,
    /// The sequence number is out of range; the sender must NACK/retry.
    Invalid,
}

/// Wire/migration-portable snapshot of a `FanoutFifo`'s full state
/// (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub queuetype: String,
    pub fifo: Vec<Option<serde_json::Value>>,
    pub n: usize,
    pub readers: Vec<PortId>,
    pub write_pos: u64,
    pub read_pos: HashMap<PortId, u64>,
    pub tentative_read_pos: HashMap<PortId, u64>,
}

/// A sequenced, multi-reader ring buffer with fanout (broadcast) delivery.
///
/// Capacity is `N` usable slots; internally the ring allocates `N + 1`
/// slots so that "full" and "empty" are distinguishable without a
/// separate counter (spec §3).
#[derive(Debug, Clone)]
pub struct FanoutFifo {
    fifo: Vec<Option<Token>>,
    n: usize,
    write_pos: u64,
    read_pos: HashMap<PortId, u64>,
    tentative_read_pos: HashMap<PortId, u64>,
}

impl FanoutFifo {
    #[must_use]
    pub fn new(options: QueueOptions) -> Self {
        let n = options.capacity;
        Self {
            fifo: vec![None; n + 1],
            n,
            write_pos: 0,
            read_pos: HashMap::new(),
            tentative_read_pos: HashMap::new(),
        }
    }

    /// Configured usable capacity (not counting the reserved slot).
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.n
    }

    #[must_use]
    pub fn readers(&self) -> impl Iterator<Item = &PortId> {
        self.read_pos.keys()
    }

    /// Add a reader; fresh readers start at position 0 and observe the
    /// full surviving buffer (spec §3 invariant).
    pub fn add_reader(&mut self, reader: PortId) {
        self.read_pos.entry(reader).or_insert(0);
        self.tentative_read_pos.entry(reader).or_insert(0);
    }

    /// Remove a reader, forgetting its positions.
    pub fn remove_reader(&mut self, reader: PortId) {
        self.read_pos.remove(&reader);
        self.tentative_read_pos.remove(&reader);
    }

    fn slowest_read_pos(&self) -> u64 {
        self.read_pos.values().copied().min().unwrap_or(self.write_pos)
    }

    /// True iff the slowest reader allows `n` more writes.
    #[must_use]
    pub fn slots_available(&self, n: usize) -> bool {
        let in_flight = self.write_pos - self.slowest_read_pos();
        (self.n as u64).saturating_sub(in_flight) >= n as u64
    }

    /// Append a token at `write_pos`.
    pub fn write(&mut self, token: Token) -> CoreResult<()> {
        if !self.slots_available(1) {
            return Err(CoreError::QueueFull);
        }
        let idx = (self.write_pos % (self.n as u64 + 1)) as usize;
        self.fifo[idx] = Some(token);
        self.write_pos += 1;
        trace!(write_pos = self.write_pos, "[FANOUT] wrote token");
        Ok(())
    }

    fn tentative_pos(&self, reader: PortId) -> CoreResult<u64> {
        self.tentative_read_pos
            .get(&reader)
            .copied()
            .ok_or(CoreError::UnknownReader(reader))
    }

    /// True iff at least `n` unread (tentative) tokens are available to
    /// `reader`.
    pub fn tokens_available(&self, n: usize, reader: PortId) -> CoreResult<bool> {
        let tentative = self.tentative_pos(reader)?;
        Ok(self.write_pos - tentative >= n as u64)
    }

    /// Read at `tentative_read_pos[reader]`, advancing it. Does not
    /// finalize the read — call `commit` once the peer has acknowledged.
    pub fn peek(&mut self, reader: PortId) -> CoreResult<Token> {
        if !self.tokens_available(1, reader)? {
            return Err(CoreError::QueueEmpty(reader));
        }
        let pos = self.tentative_read_pos[&reader];
        let idx = (pos % (self.n as u64 + 1)) as usize;
        let token = self.fifo[idx].clone().expect("available slot has a token");
        *self.tentative_read_pos.get_mut(&reader).unwrap() = pos + 1;
        Ok(token)
    }

    /// Finalize all tentative reads for `reader`.
    pub fn commit(&mut self, reader: PortId) -> CoreResult<()> {
        let tentative = self.tentative_pos(reader)?;
        *self
            .read_pos
            .get_mut(&reader)
            .ok_or(CoreError::UnknownReader(reader))? = tentative;
        Ok(())
    }

    /// Roll back tentative reads to the last committed position.
    pub fn cancel(&mut self, reader: PortId) -> CoreResult<()> {
        let committed = *self
            .read_pos
            .get(&reader)
            .ok_or(CoreError::UnknownReader(reader))?;
        *self.tentative_read_pos.get_mut(&reader).unwrap() = committed;
        Ok(())
    }

    // --- sequence-number protocol for tunnel endpoints ---------------

    /// Write at an explicit sequence number, tolerating duplicates and
    /// rejecting future sequence numbers (spec §4.1).
    pub fn com_write(&mut self, token: Token, seq: u64) -> ComResponse {
        match seq.cmp(&self.write_pos) {
            std::cmp::Ordering::Equal => {
                // `slots_available` was already checked by the caller via
                // the QueueFull error path; com_write reports that
                // distinctly so a NACK (not a protocol error) is sent.
                if self.write(token).is_err() {
                    return ComResponse::Invalid;
                }
                ComResponse::Handled
            }
            std::cmp::Ordering::Less => ComResponse::Unhandled,
            std::cmp::Ordering::Greater => ComResponse::Invalid,
        }
    }

    /// Peek with the pre-advance sequence number attached, for sending
    /// over the wire.
    pub fn com_peek(&mut self, reader: PortId) -> CoreResult<(u64, Token)> {
        let seq = self.tentative_pos(reader)?;
        let token = self.peek(reader)?;
        Ok((seq, token))
    }

    /// Commit exactly one token when `seq` matches the oldest
    /// uncommitted read; otherwise report whether the ACK was for a
    /// token already committed (`Unhandled`, wait for earlier ones) or
    /// for an unread future token (`Invalid`).
    pub fn com_commit(&mut self, reader: PortId, seq: u64) -> CoreResult<ComResponse> {
        let tentative = self.tentative_pos(reader)?;
        if seq >= tentative {
            return Ok(ComResponse::Invalid);
        }
        let committed = self.read_pos[&reader];
        if committed < tentative {
            if seq == committed {
                *self.read_pos.get_mut(&reader).unwrap() = committed + 1;
                return Ok(ComResponse::Handled);
            }
            return Ok(ComResponse::Unhandled);
        }
        Ok(ComResponse::Unhandled)
    }

    /// Rewind tentative reads to `seq` so they are re-peeked and resent.
    ///
    /// Guard is the corrected one from the spec's design notes:
    /// `seq >= tentative_read_pos[reader] || seq < read_pos[reader]` is
    /// invalid (there is nothing tentative at or after `seq`, or `seq`
    /// was already committed and cannot be un-committed).
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

    /// True iff no tentative reads are outstanding for `reader`.
    pub fn com_is_committed(&self, reader: PortId) -> CoreResult<bool> {
        let tentative = self.tentative_pos(reader)?;
        let committed = *self
            .read_pos
            .get(&reader)
            .ok_or(CoreError::UnknownReader(reader))?;
        Ok(tentative == committed)
    }

    // --- migration -----------------------------------------------------

    /// Serialize full queue state for actor migration (spec §6).
    #[must_use]
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            queuetype: "fanout_fifo".to_string(),
            fifo: self
                .fifo
                .iter()
                .map(|t| t.as_ref().map(|t| t.encode()))
                .collect(),
            n: self.n,
            readers: self.read_pos.keys().copied().collect(),
            write_pos: self.write_pos,
            read_pos: self.read_pos.clone(),
            tentative_read_pos: self.tentative_read_pos.clone(),
        }
    }

    /// Restore from a snapshot. Rejects any divergence in ring size `N`
    /// between source and target, per spec §6.
    pub fn restore(snapshot: &QueueSnapshot) -> CoreResult<Self> {
        if snapshot.fifo.len() != snapshot.n + 1 {
            return Err(CoreError::ProtocolInvalid);
        }
        Ok(Self {
            fifo: snapshot
                .fifo
                .iter()
                .map(|v| v.as_ref().map(|v| Token::from_value(v.clone())))
                .collect(),
            n: snapshot.n,
            write_pos: snapshot.write_pos,
            read_pos: snapshot.read_pos.clone(),
            tentative_read_pos: snapshot.tentative_read_pos.clone(),
        })
    }

    /// Reject a restore whose configured capacity doesn't match this
    /// queue's own (spec §6: "any divergence in ring size N ... is
    /// rejected").
    pub fn restore_into(&mut self, snapshot: &QueueSnapshot) -> CoreResult<()> {
        if snapshot.n != self.n {
            return Err(CoreError::ProtocolInvalid);
        }
        *self = Self::restore(snapshot)?;
        Ok(())
    }
}
