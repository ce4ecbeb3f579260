//! Infrastructure layer for the radar client.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `radar_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`network`** – The TLS client driver: resolves and dials the radar
//!   server, owns the single pumped connection and implements the
//!   application's `OutboundPublisher` port.
//!
//! - **`storage`** – TOML configuration file.

pub mod network;
pub mod storage;
