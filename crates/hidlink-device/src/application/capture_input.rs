//! CaptureInputUseCase: turns physical input captured on the device into
//! event frames for the host.
//!
//! While a link is recording, every key, mouse movement, and button change
//! seen by the device is reported upstream.  Keys arrive as HID scan codes
//! and are translated to virtual keys here, so the host never sees the
//! device's position-based codes.

use hidlink_core::protocol::messages::{ButtonAction, KeyAction, ModifierFlags, MouseButton};
use hidlink_core::{Event, KeyTranslator, UNSUPPORTED};
use tracing::{debug, trace};

/// One piece of input captured from a physical keyboard or mouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturedInput {
    Key {
        scan_code: u8,
        modifiers: ModifierFlags,
        pressed: bool,
    },
    MouseMove {
        dx: i16,
        dy: i16,
    },
    MouseButton {
        button: MouseButton,
        pressed: bool,
    },
}

/// The Capture Input use case.
#[derive(Debug, Default, Clone, Copy)]
pub struct CaptureInputUseCase;

impl CaptureInputUseCase {
    pub fn new() -> Self {
        Self
    }

    /// Converts captured input into the event to report, if any.
    ///
    /// Returns `None` when `recording` is off, or when a key's scan code has
    /// no virtual-key equivalent.
    pub fn capture(&self, input: &CapturedInput, recording: bool) -> Option<Event> {
        if !recording {
            trace!(?input, "not recording; dropping captured input");
            return None;
        }

        match *input {
            CapturedInput::Key {
                scan_code,
                modifiers,
                pressed,
            } => {
                let virtual_key = KeyTranslator::scan_to_virtual(scan_code);
                if virtual_key == UNSUPPORTED {
                    debug!(scan_code, "dropping unsupported scan code");
                    return None;
                }
                Some(Event::KeyboardInput {
                    virtual_key,
                    modifiers,
                    action: if pressed { KeyAction::Press } else { KeyAction::Release },
                })
            }
            CapturedInput::MouseMove { dx, dy } => Some(Event::MouseMove { dx, dy }),
            CapturedInput::MouseButton { button, pressed } => Some(Event::MouseClick {
                button,
                action: if pressed { ButtonAction::Press } else { ButtonAction::Release },
            }),
        }
    }
}
