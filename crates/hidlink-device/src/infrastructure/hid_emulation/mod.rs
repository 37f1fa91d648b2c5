//! HID emulation back-ends.
//!
//! Only the in-memory [`mock::MockHidEmulator`] ships here; a hardware
//! back-end implements [`HidEmulator`](crate::application::execute_command::HidEmulator)
//! the same way.

pub mod mock;
