//! In-memory HID emulator.
//!
//! # Why a mock emulator?
//!
//! Real HID emulation needs a USB device controller and actually moves a
//! cursor on whatever machine is attached.  `MockHidEmulator` replaces every
//! call with an in-memory record, in call order, so tests and headless runs
//! can see exactly what would have been injected.
//!
//! # `should_fail` flag
//!
//! Set `should_fail = true` to make every call return
//! [`EmulationError::Device`].  This lets callers exercise their error paths
//! without broken hardware.

use std::sync::{Mutex, PoisonError};

use hidlink_core::protocol::messages::MouseButton;
use tracing::debug;

use crate::application::execute_command::{EmulationError, HidEmulator};

/// One call made on the emulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HidAction {
    MoveAbsolute { x: u16, y: u16 },
    MoveRelative { dx: i16, dy: i16 },
    PressButton(MouseButton),
    ReleaseButton(MouseButton),
    ClickButton(MouseButton),
    PressKey(u8),
    ReleaseKey(u8),
    ReleaseAll,
    TypeText(String),
}

/// An emulator that records every call instead of touching hardware.
#[derive(Debug, Default)]
pub struct MockHidEmulator {
    actions: Mutex<Vec<HidAction>>,
    /// When `true`, every method returns an error and records nothing.
    pub should_fail: bool,
}

impl MockHidEmulator {
    /// Creates an emulator with an empty record and `should_fail = false`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an emulator that fails every call.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Returns a copy of every recorded call, oldest first.
    pub fn actions(&self) -> Vec<HidAction> {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drops all recorded calls.
    pub fn clear(&self) {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, action: HidAction) -> Result<(), EmulationError> {
        if self.should_fail {
            return Err(EmulationError::Device("mock failure".into()));
        }
        debug!(?action, "hid");
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action);
        Ok(())
    }
}

impl HidEmulator for MockHidEmulator {
    fn move_absolute(&self, x: u16, y: u16) -> Result<(), EmulationError> {
        self.record(HidAction::MoveAbsolute { x, y })
    }

    fn move_relative(&self, dx: i16, dy: i16) -> Result<(), EmulationError> {
        self.record(HidAction::MoveRelative { dx, dy })
    }

    fn press_button(&self, button: MouseButton) -> Result<(), EmulationError> {
        self.record(HidAction::PressButton(button))
    }

    fn release_button(&self, button: MouseButton) -> Result<(), EmulationError> {
        self.record(HidAction::ReleaseButton(button))
    }

    fn click_button(&self, button: MouseButton) -> Result<(), EmulationError> {
        self.record(HidAction::ClickButton(button))
    }

    fn press_key(&self, key: u8) -> Result<(), EmulationError> {
        self.record(HidAction::PressKey(key))
    }

    fn release_key(&self, key: u8) -> Result<(), EmulationError> {
        self.record(HidAction::ReleaseKey(key))
    }

    fn release_all(&self) -> Result<(), EmulationError> {
        self.record(HidAction::ReleaseAll)
    }

    fn type_text(&self, text: &str) -> Result<(), EmulationError> {
        self.record(HidAction::TypeText(text.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calls_are_recorded_in_order() {
        // Arrange
        let emulator = MockHidEmulator::new();

        // Act
        emulator.press_key(0x80).unwrap();
        emulator.press_key(b'c').unwrap();
        emulator.release_all().unwrap();

        // Assert
        assert_eq!(
            emulator.actions(),
            vec![
                HidAction::PressKey(0x80),
                HidAction::PressKey(b'c'),
                HidAction::ReleaseAll
            ]
        );
    }

    #[test]
    fn test_failing_emulator_returns_error_and_records_nothing() {
        let emulator = MockHidEmulator::failing();
        assert!(emulator.move_absolute(1, 2).is_err());
        assert!(emulator.actions().is_empty());
    }

    #[test]
    fn test_clear_drops_history() {
        let emulator = MockHidEmulator::new();
        emulator.type_text("abc").unwrap();
        emulator.clear();
        assert!(emulator.actions().is_empty());
    }
}
