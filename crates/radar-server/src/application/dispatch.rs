//! Per-packet dispatch policy for plane sessions.
//!
//! Every session's read loop hands each decoded packet to [`RadarDispatch`].
//! The decision itself lives in the pure [`apply_policy`] function so it can
//! be tested without a connection.
//!
//! | Packet                              | Decision                            |
//! |-------------------------------------|-------------------------------------|
//! | `PositionUpdate`, squawk 7500       | close the session, record nothing   |
//! | `PositionUpdate`, any other squawk  | record one radar return             |
//! | anything not sent simulator → radar | dispatch error, session stays open  |

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use radar_core::protocol::PacketDirection;
use radar_core::pump::DispatchError;
use radar_core::{Connection, Packet, PacketHandler, PacketRegistry, PositionUpdate, Squawk};
use tracing::info;

use super::radar_returns::{RadarReturn, RadarReturnStore};

/// Outcome of the dispatch policy for one packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Store this update as a radar return.
    Record(PositionUpdate),
    /// Close the originating session; the update is not stored.
    ///
    /// Triggered by squawk 7500 as the transponder reads it, which is
    /// `Squawk(0x7500)` on the wire (binary-coded octal).  Earlier radar builds
    /// compared the raw field against decimal `7500` (`0x1D4C`), a value no
    /// BCD register holds; that value is recorded like any other code here.
    ForceDisconnect { squawk: Squawk },
}

/// Decides what a packet received from a simulator means.
///
/// # Errors
///
/// [`DispatchError::UnexpectedPacket`] for a kind the registry does not list
/// as simulator-to-radar.
pub fn apply_policy(registry: &PacketRegistry, packet: Packet) -> Result<Verdict, DispatchError> {
    let kind = packet.kind();
    let inbound = registry
        .by_kind(kind)
        .is_some_and(|d| d.direction == PacketDirection::SimToRadar);
    if !inbound {
        return Err(DispatchError::UnexpectedPacket { kind });
    }

    match packet {
        Packet::PositionUpdate(update) if update.squawk == Squawk::UNLAWFUL_INTERFERENCE => {
            Ok(Verdict::ForceDisconnect { squawk: update.squawk })
        }
        Packet::PositionUpdate(update) => Ok(Verdict::Record(update)),
    }
}

/// [`PacketHandler`] installed on every accepted plane session.
#[derive(Debug, Clone)]
pub struct RadarDispatch {
    store: Arc<RadarReturnStore>,
    registry: &'static PacketRegistry,
}

impl RadarDispatch {
    pub fn new(store: Arc<RadarReturnStore>, registry: &'static PacketRegistry) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &Arc<RadarReturnStore> {
        &self.store
    }
}

#[async_trait]
impl PacketHandler for RadarDispatch {
    async fn on_packet(&self, connection: &Connection, packet: Packet) -> Result<(), DispatchError> {
        match apply_policy(self.registry, packet)? {
            Verdict::Record(update) => {
                self.store.append(RadarReturn::new(update, Instant::now(), connection.id()));
            }
            Verdict::ForceDisconnect { squawk } => {
                info!(
                    session = %connection.id(),
                    peer = ?connection.peer(),
                    %squawk,
                    "emergency squawk received; disconnecting session"
                );
                connection.close();
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
