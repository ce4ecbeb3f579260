//! Connection pump: drives one authenticated duplex connection.
//!
//! # Lifecycle (for beginners)
//!
//! ```text
//!  Handshaking ──ok──▶ Open ──▶ Closing ──▶ Closed
//!       │                                    ▲
//!       └────────── auth failure / timeout ──┘
//! ```
//!
//! A [`Connection`] is created around a *handshake future* that yields the
//! encrypted stream.  While it runs the connection is `Handshaking`; packets
//! sent in this state wait in the outbound queue.  Once the stream exists two
//! loops run concurrently on its halves:
//!
//! - the **read loop** decodes one frame at a time and passes each packet to
//!   the [`PacketHandler`] supplied by the owner (the server's dispatch policy,
//!   or [`QueueInbound`] for the client);
//! - the **write loop** takes packets from the outbound queue and writes them
//!   as frames.
//!
//! Whichever loop stops first (peer hang-up, framing error, write failure, or
//! an explicit [`Connection::close`]) cancels the other.  When both have
//! exited the stream is shut down exactly once and the state becomes
//! `Closed`.

pub mod connection;
pub mod error;
pub mod queue;

pub use connection::{
    Connection, ConnectionId, ConnectionState, PacketHandler, PumpOptions, QueueInbound,
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_QUEUE_CAPACITY,
};
pub use error::{DispatchError, LinkError};
pub use queue::{DropOldestQueue, QueueClosed};
