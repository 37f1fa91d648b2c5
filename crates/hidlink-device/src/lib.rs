//! hidlink-device library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the device do? (for beginners)
//!
//! The *device* is the peripheral that pretends to be a USB mouse and
//! keyboard for the computer it is plugged into.  A *host* computer drives it
//! over a serial link by sending command frames.
//!
//! The device runtime:
//!
//! 1. Accepts links from hosts (a TCP bridge standing in for the UART).
//! 2. Reassembles command frames byte by byte, rejecting corrupt, oversized,
//!    or stalled frames with an error event.
//! 3. Translates virtual keys into the device's native keystrokes and drives
//!    the HID emulation layer.
//! 4. While a link is recording, streams input captured from a physical
//!    keyboard and mouse back to the host as event frames.

/// Application layer: use cases for the device.
pub mod application;

/// Infrastructure layer: HID emulation, capture source, links, and config.
pub mod infrastructure;
