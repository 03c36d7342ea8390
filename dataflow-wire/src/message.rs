//! Wire messages exchanged between a `TunnelOutEndpoint` and its peer
//! `TunnelInEndpoint` (spec §6). Self-describing via `serde_json`, the
//! same way `dataflow_core::token::Token` is: the transport core never
//! needs a schema registry to move a token between nodes.

use dataflow_core::ids::PortId;
use dataflow_core::token::Token;
use serde::{Deserialize, Serialize};

/// Outcome reported back to a `TunnelOutEndpoint` for one sequence
/// number. `Abort` is a reply status, not a connection-level event: a
/// sender that receives it must stop retrying that token but must not
/// invent reconnection or teardown policy on its own (design notes).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenReplyStatus {
    Ack,
    Nack,
    Abort,
}

/// A single message on the wire between two tunnel endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum TunnelMessage {
    /// Deliver one token at `seq` to `port`.
    Token {
        port: PortId,
        seq: u64,
        token: Token,
    },
    /// Reply to a `Token` message.
    TokenReply {
        port: PortId,
        seq: u64,
        status: TokenReplyStatus,
    },
}

impl TunnelMessage {
    #[must_use]
    pub const fn port(&self) -> PortId {
        match self {
            Self::Token { port, .. } | Self::TokenReply { port, .. } => *port,
        }
    }

    /// Serialize for a `TunnelTransport::send`.
    ///
    /// # Errors
    /// Never fails for messages built by this crate; kept fallible
    /// because `serde_json` considers serialization fallible in
    /// general.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse bytes received from a peer.
    ///
    /// # Errors
    /// Returns an error if `bytes` is not a valid encoding of this enum,
    /// e.g. a malformed or truncated frame from an untrusted peer.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_message_round_trips() {
        let msg = TunnelMessage::Token {
            port: PortId::new(),
            seq: 7,
            token: Token::new(42),
        };
        let bytes = msg.encode().unwrap();
        let decoded = TunnelMessage::decode(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn abort_reply_round_trips() {
        let port = PortId::new();
        let msg = TunnelMessage::TokenReply {
            port,
            seq: 3,
            status: TokenReplyStatus::Abort,
        };
        let bytes = msg.encode().unwrap();
        assert_eq!(TunnelMessage::decode(&bytes).unwrap().port(), port);
    }

    #[test]
    fn malformed_bytes_fail_to_decode() {
        assert!(TunnelMessage::decode(b"not json").is_err());
    }
}
