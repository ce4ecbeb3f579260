//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the server's TOML configuration, falls back
//! to defaults when the file does not exist yet (first run), and can write a
//! starter file for the operator to edit.

pub mod config;
