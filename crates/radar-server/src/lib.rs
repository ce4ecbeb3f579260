//! radar-server library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does radar-server do? (for beginners)
//!
//! The *server* is the air-traffic display side.  Simulator clients connect
//! to it over mutually authenticated TLS and stream `PositionUpdate` packets.
//! For every update the server either records a *radar return* (kept for a
//! few seconds so the display can draw a target and its trail) or, if the
//! aircraft squawks the unlawful-interference code, drops that session.
//!
//! 1. `infrastructure::network` accepts TCP connections, runs the TLS
//!    handshake and wraps each one in a `radar_core::Connection`.
//! 2. `application::dispatch` decides what each received packet means.
//! 3. `application::radar_returns` holds the time-windowed returns and expires
//!    old ones on a timer.
//! 4. `application::manage_sessions` tracks live sessions so a return can be
//!    traced back to its sender while that sender is still connected.

/// Application layer: dispatch policy, return store and session table.
pub mod application;

/// Infrastructure layer: listener, session manager and configuration files.
pub mod infrastructure;
