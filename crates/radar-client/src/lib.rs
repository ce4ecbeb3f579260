//! radar-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does radar-client do? (for beginners)
//!
//! The *client* runs next to the flight simulator.  It connects to a radar
//! server over mutually authenticated TLS and streams the user's aircraft
//! position to it several times per second.
//!
//! 1. `infrastructure::network::RadarClient` dials the server and owns the
//!    connection; it refuses a second connection while one is live.
//! 2. `application::telemetry` turns each simulator sample into a
//!    `PositionUpdate` packet and hands it to the client's outbound queue.
//! 3. Anything the server sends back is available from `RadarClient::recv`.

/// Application layer: telemetry conversion and periodic reporting.
pub mod application;

/// Infrastructure layer: TLS client driver and configuration file.
pub mod infrastructure;
