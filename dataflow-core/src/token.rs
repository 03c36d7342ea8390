//! The opaque token carrier.
//!
//! A `Token` is a single unit of user data flowing between ports. The
//! transport core never inspects its contents (see the crate's Non-goals);
//! it only needs to move it, store it in the ring buffer, and serialize it
//! for the wire and for migration snapshots. Encoding is delegated to
//! `serde_json::Value`, which is self-describing the way the wire protocol
//! requires (see `dataflow_wire::message`).
//!
//! # Examples
//!
//! ```
//! use dataflow_core::token::Token;
//!
//! let t = Token::new(42);
//! let encoded = t.encode();
//! let decoded = Token::decode(&encoded).unwrap();
//! assert_eq!(t, decoded);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An immutable, opaque carrier of one unit of dataflow payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token(Value);

impl Token {
    /// Wrap any serializable value as a token.
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    /// Build a token directly from an already-encoded value (used when
    /// decoding wire messages or migration snapshots).
    #[must_use]
    pub const fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Deterministic, self-describing encoding.
    #[must_use]
    pub fn encode(&self) -> Value {
        self.0.clone()
    }

    /// Decode a previously-encoded value. Fails only if the value is not
    /// valid JSON-shaped data, which cannot happen for values produced by
    /// `encode` — it exists for symmetry with the wire format, where an
    /// untrusted peer's bytes are parsed into a `Value` first.
    pub fn decode(value: &Value) -> Result<Self, serde_json::Error> {
        Ok(Self(value.clone()))
    }

    /// Borrow the underlying value without taking ownership.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<i64> for Token {
    fn from(v: i64) -> Self {
        Self::new(v)
    }
}

impl From<String> for Token {
    fn from(v: String) -> Self {
        Self::new(v)
    }
}

impl From<&str> for Token {
    fn from(v: &str) -> Self {
        Self::new(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let t = Token::new(serde_json::json!({"kind": "reading", "value": 23.5}));
        let decoded = Token::decode(&t.encode()).unwrap();
        assert_eq!(t, decoded);
    }

    #[test]
    fn integers_convert_directly() {
        let t: Token = 7.into();
        assert_eq!(t.as_value(), &serde_json::json!(7));
    }
}
