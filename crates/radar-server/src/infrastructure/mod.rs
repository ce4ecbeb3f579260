//! Infrastructure layer for the radar server.
//!
//! Contains the OS-facing adapters: the TCP/TLS listener and the TOML
//! configuration file.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `radar_core`, but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod storage;
