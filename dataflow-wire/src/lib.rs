//! # Dataflow Wire
//!
//! **Internal tunnel and local endpoint protocol for the dataflow
//! transport core.**
//!
//! This crate provides the reliable, ordered, exactly-once delivery
//! protocol that moves tokens between two queues, whether those queues
//! sit in the same process (`local`) or on different nodes, connected
//! by an ACK/NACK tunnel protocol riding on whatever transport the
//! embedding runtime provides (`endpoint`, `transport`, `message`).
//!
//! ## Endpoint kinds
//!
//! - **Local**: direct pump between two queues in one process, no ACK
//!   round trip needed.
//! - **Tunnel**: ACK/NACK flow control with adaptive backoff, for
//!   moving tokens across a node boundary over an unreliable link.
//!
//! ## Sans-IO
//!
//! Nothing in this crate opens a socket or blocks. A `TunnelOutEndpoint`
//! hands encoded bytes to a [`transport::TunnelTransport`] the
//! embedding runtime supplies, and reacts to `Ack`/`Nack` events fed
//! back in — the same separation of protocol state machine from actual
//! I/O used by this crate's sibling workspace's sans-IO session.

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod endpoint;
pub mod local;
pub mod message;
pub mod monitor;
pub mod scheduler;
pub mod transport;

pub use endpoint::{InboundQueue, OutboundQueue, TunnelInEndpoint, TunnelOutEndpoint};
pub use local::{LocalEndpoint, TransferQueue};
pub use message::TunnelMessage;
pub use monitor::Monitor;
pub use scheduler::{NoOpScheduler, SchedulerHandle};
pub use transport::TunnelTransport;

/// Prelude module for convenient imports.
///
/// ```rust
/// use dataflow_wire::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        InboundQueue, LocalEndpoint, Monitor, NoOpScheduler, OutboundQueue, SchedulerHandle,
        TransferQueue, TunnelInEndpoint, TunnelMessage, TunnelOutEndpoint, TunnelTransport,
    };
}
