//! Network infrastructure for the radar server.
//!
//! # Sub-modules
//!
//! - **`server`** – Binds the TLS listener, runs the accept loop and the
//!   return sweeper, and performs the cooperative shutdown.
//!
//! - **`session_manager`** – Turns each handshake into a `PlaneSession` with
//!   the dispatch policy installed, removes sessions once their connection
//!   closes, and resolves a radar return's origin.

pub mod server;
pub mod session_manager;

pub use server::{RadarServer, ServerError, ServerSettings};
pub use session_manager::SessionManager;
