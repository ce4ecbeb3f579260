//! # radar-core
//!
//! Shared library for OpenRadar containing the packet codec, the pinned-root
//! TLS trust layer, and the connection pump that drives one authenticated
//! duplex connection.
//!
//! This crate is used by both the server (the air-traffic display side) and
//! the client (the flight-simulator side).  It has no knowledge of user
//! interfaces or of the simulator; those talk to the server and client crates
//! through narrow interfaces.
//!
//! # Architecture overview (for beginners)
//!
//! A flight simulator periodically reports where the user's aircraft is.  The
//! client sends those reports over the network to one or more radar displays
//! (servers), which keep the last few seconds of returns on screen.
//!
//! This crate (`radar-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How bytes travel over the network.  Every frame is a
//!   4-byte header (`tag:u16 | length:u16`, little-endian) followed by a
//!   fixed-size payload whose layout is registered per packet kind.
//!
//! - **`trust`** – How the two ends prove who they are.  Both sides present a
//!   certificate and both sides accept only certificates that chain to a single
//!   pinned root, ignoring the host's system trust store.
//!
//! - **`pump`** – How one connection is driven.  A read loop decodes frames and
//!   hands them to a dispatch callback; a write loop drains a bounded,
//!   drop-oldest outbound queue onto the wire.
//!
//! - **`geo`** – Latitude/longitude helpers shared by producers and displays.

pub mod geo;
pub mod protocol;
pub mod pump;
pub mod sync;
pub mod trust;

// Re-export the most-used types at the crate root so callers can write
// `radar_core::Packet` instead of `radar_core::protocol::registry::Packet`.
pub use geo::LatLng;
pub use protocol::codec::{decode_frame, encode_frame, ProtocolError};
pub use protocol::packets::{CallSign, PositionUpdate, Squawk};
pub use protocol::registry::{Packet, PacketKind, PacketRegistry, PacketTag};
pub use pump::{Connection, ConnectionId, ConnectionState, LinkError, PacketHandler, PumpOptions};
pub use trust::{Identity, TrustAnchor, TrustError};
