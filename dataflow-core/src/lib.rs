//! Dataflow Core
//!
//! Runtime-agnostic building blocks for the dataflow transport core:
//! - Stable identifiers for actors, ports and nodes (`ids`)
//! - The opaque token carrier (`token`)
//! - The sequenced, multi-reader fanout queue (`queue`)
//! - Its round-robin sibling (`round_robin`)
//! - Adaptive ACK/NACK backoff (`backoff`)
//! - Queue configuration (`options`)
//! - Error types (`error`)

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod backoff;
pub mod error;
pub mod ids;
pub mod options;
pub mod queue;
pub mod round_robin;
pub mod token;

// Optional: a small prelude to make downstream crates ergonomic.
// Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::backoff::TunnelBackoff;
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::ids::{ActorId, NodeId, PortId};
    pub use crate::options::QueueOptions;
    pub use crate::queue::{ComResponse, FanoutFifo, QueueSnapshot};
    pub use crate::round_robin::{RoundRobinFifo, RoundRobinSnapshot};
    pub use crate::token::Token;
}
