//! # Dataflow
//!
//! Runtime wiring for the dataflow transport core: ports, connection
//! orchestration, migration, a best-effort directory, and per-actor
//! state, built on [`dataflow_core`]'s sequenced queues and
//! [`dataflow_wire`]'s local/tunnel endpoints.
//!
//! ## Architecture
//!
//! - **`dataflow-core`**: the sequenced, multi-reader queues and the
//!   token model.
//! - **`dataflow-wire`**: local and tunnel endpoints, the ACK/NACK wire
//!   protocol, and the scheduler/transport seams into the embedding
//!   runtime.
//! - **`dataflow`** (this crate): ports, connections, migration,
//!   directory and actor state built on top of both.
//!
//! ## Safety
//!
//! All layers are safe Rust; `dataflow-core` and `dataflow-wire` both
//! carry `#![deny(unsafe_code)]`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

/// Per-actor state management.
pub mod actor_state;
/// Connection orchestration between ports.
pub mod connection;
/// Best-effort port placement directory.
pub mod directory;
/// The connection-layer error type.
pub mod error;
/// The `Endpoint` trait and its local/tunnel wrapper types.
pub mod endpoint;
/// Development logging helper.
pub mod logging;
/// Live migration of port queue state.
pub mod migration;
/// Port: a queue plus its attached peer endpoints.
pub mod port;
/// `QueueHandle`: the fanout-or-round-robin queue a `Port` owns.
pub mod queue_handle;

pub use connection::{Connection, ConnectResult, ConnectionKind, ConnectionState};
pub use endpoint::{Endpoint, LocalPeerEndpoint, TunnelPeerEndpoint};
pub use error::ConnectError;
pub use port::{Port, RemovedEndpoint, Terminate};
pub use queue_handle::{QueueHandle, QueueHandleSnapshot};
