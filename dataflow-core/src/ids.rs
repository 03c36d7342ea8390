//! Stable identifiers for actors, ports and nodes.
//!
//! Mirrors the parse/`Display` shape of a transport address (see the
//! `tcp://`/`ipc://`/`inproc://` endpoint parser this crate's sibling
//! workspace used to carry) but for opaque UUIDs rather than socket
//! addresses: ports, actors and nodes are named once and referred to by
//! that name for their whole lifetime, including across migration.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID (used when restoring from a snapshot
            /// or decoding a wire message).
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(PortId, "Stable 128-bit identifier of a port.");
uuid_id!(ActorId, "Stable 128-bit identifier of an actor.");
uuid_id!(NodeId, "Stable 128-bit identifier of a runtime node.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_display_and_parse() {
        let id = PortId::new();
        let parsed: PortId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn distinct_ids_are_distinct() {
        assert_ne!(PortId::new(), PortId::new());
    }

    #[test]
    fn invalid_string_fails_to_parse() {
        assert!("not-a-uuid".parse::<PortId>().is_err());
    }
}
