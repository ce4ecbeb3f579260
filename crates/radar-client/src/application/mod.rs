//! Application layer use cases for the radar client.
//!
//! - **`telemetry`** – Converts simulator telemetry samples into
//!   `PositionUpdate` packets and feeds them to an `OutboundPublisher` on a
//!   fixed period.  A `SyntheticFlight` source stands in for the simulator.

pub mod telemetry;
