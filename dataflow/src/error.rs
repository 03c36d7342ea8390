//! Errors surfaced at the connection-orchestration layer.
//!
//! Only `CoreError::ProtocolInvalid` and `CoreError::PeerRefused` ever
//! reach here (spec §7) — everything else is flow control that
//! `dataflow-wire`'s endpoints absorb internally.

use thiserror::Error;

use dataflow_core::error::CoreError;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectError {
    #[error("peer violated the sequencing protocol")]
    Protocol,
    #[error("peer refused the connection")]
    Refused,
}

impl From<&CoreError> for ConnectError {
    fn from(e: &CoreError) -> Self {
        match e {
            CoreError::PeerRefused => Self::Refused,
            _ => Self::Protocol,
        }
    }
}
