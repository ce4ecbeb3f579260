//! Per-connection error taxonomy.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::codec::{ProtocolError, StreamError};
use crate::protocol::registry::PacketKind;

/// Why a connection failed to open or stopped running.
///
/// Every variant is contained to the one connection it describes; none of
/// them is fatal to the accept loop or to other sessions.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The peer's certificate was rejected, or ours was rejected by the peer.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The TLS handshake failed for a reason other than the peer's identity.
    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("handshake did not complete within {0:?}")]
    HandshakeTimeout(Duration),

    /// Unknown tag, length mismatch or undecodable payload.
    #[error("framing error: {0}")]
    Framing(#[from] ProtocolError),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The connection was closed locally before it could be used.
    #[error("connection closed")]
    Closed,
}

impl From<StreamError> for LinkError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Closed => LinkError::Closed,
            StreamError::Protocol(e) => LinkError::Framing(e),
            StreamError::Io(e) => LinkError::Transport(e),
        }
    }
}

/// Returned by a [`crate::pump::PacketHandler`] for a packet it will not process.
///
/// Dispatch errors are logged by the read loop; they do not end the connection.
#[derive(Debug, Error, PartialEq)]
pub enum DispatchError {
    #[error("no dispatch rule for {kind} packets")]
    UnexpectedPacket { kind: PacketKind },

    #[error("packet rejected: {0}")]
    Rejected(String),
}
