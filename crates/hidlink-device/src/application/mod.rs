//! Application layer use cases for the device runtime.
//!
//! # What use cases does the device have?
//!
//! - **`execute_command`** – Decodes command frames from the host and drives
//!   the HID emulation layer.  The emulator is an [`HidEmulator`] trait object
//!   injected at construction time, so the same logic runs against real
//!   hardware or an in-memory mock.
//!
//! - **`capture_input`** – While a link is recording, converts input from the
//!   device's physical keyboard and mouse into event frames for the host.
//!
//! [`HidEmulator`]: execute_command::HidEmulator

pub mod capture_input;
pub mod execute_command;
