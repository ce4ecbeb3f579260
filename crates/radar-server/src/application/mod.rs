//! Application layer use cases for the radar server.
//!
//! Nothing here opens sockets or reads files; the infrastructure layer feeds
//! decoded packets in and reads snapshots out.
//!
//! # Sub-modules
//!
//! - **`dispatch`** – The per-packet policy run by every session's read loop:
//!   record a radar return, or force a disconnect on the emergency squawk.
//!
//! - **`radar_returns`** – The time-windowed store of received position
//!   updates and the periodic sweep that expires them.
//!
//! - **`manage_sessions`** – The table of live plane sessions, keyed by
//!   connection id, used to resolve a return's origin without owning it.

pub mod dispatch;
pub mod manage_sessions;
pub mod radar_returns;
