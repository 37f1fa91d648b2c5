//! Infrastructure layer for the device runtime.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `hidlink_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`hid_emulation`** – Implementations of the `HidEmulator` trait.  The
//!   in-memory `MockHidEmulator` records every call for tests and headless runs.
//!
//! - **`input_capture`** – The captured-input source: parses input lines and
//!   publishes them on the broadcast channel the links subscribe to.
//!
//! - **`link`** – TCP accept loop and the per-link read/respond loop.
//!
//! - **`storage`** – TOML configuration loading and saving.

pub mod hid_emulation;
pub mod input_capture;
pub mod link;
pub mod storage;
