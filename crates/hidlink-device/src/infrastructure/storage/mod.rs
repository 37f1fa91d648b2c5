//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the device's TOML configuration, falls back
//! to defaults when no file exists yet, and can write a default file for the
//! user to edit.

pub mod config;
