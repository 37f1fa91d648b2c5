//! hidlink-host library entry point.
//!
//! # What does the host do? (for beginners)
//!
//! The *host* is the computer in charge.  It opens a link to a hidlink
//! device and tells it what to type and where to move the mouse, one
//! command frame at a time.  It can also ask the device to *record*: the
//! device then streams back whatever a person does on the physical keyboard
//! and mouse attached to it.
//!
//! Commands come either from individual CLI subcommands or from a script
//! file run line by line.

/// Application layer: the script language.
pub mod application;

/// Infrastructure layer: the device link.
pub mod infrastructure;
