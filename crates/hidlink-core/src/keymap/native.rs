//! The device's native keystroke codes.
//!
//! The device's keyboard emulation layer takes printable keys as their ASCII
//! character (lowercase for letters) and everything else as a code at or above
//! `0x80`.  Virtual keys are folded into this space before being injected.

use super::vk;
use crate::protocol::messages::ModifierFlags;

/// Returned when a virtual key has no native keystroke.
pub const UNSUPPORTED: u8 = 0;

pub const LEFT_CTRL: u8 = 0x80;
pub const LEFT_SHIFT: u8 = 0x81;
pub const LEFT_ALT: u8 = 0x82;
pub const LEFT_GUI: u8 = 0x83;
pub const RIGHT_CTRL: u8 = 0x84;
pub const RIGHT_SHIFT: u8 = 0x85;
pub const RIGHT_ALT: u8 = 0x86;
pub const RIGHT_GUI: u8 = 0x87;

pub const UP_ARROW: u8 = 0xDA;
pub const DOWN_ARROW: u8 = 0xD9;
pub const LEFT_ARROW: u8 = 0xD8;
pub const RIGHT_ARROW: u8 = 0xD7;
pub const BACKSPACE: u8 = 0xB2;
pub const TAB: u8 = 0xB3;
pub const RETURN: u8 = 0xB0;
pub const ESC: u8 = 0xB1;
pub const F1: u8 = 0xC2;
pub const F12: u8 = 0xCD;

/// Native keystroke for each modifier bit, in bit order.
const MODIFIER_KEYS: [u8; 8] = [
    LEFT_CTRL,
    LEFT_SHIFT,
    LEFT_ALT,
    LEFT_GUI,
    RIGHT_CTRL,
    RIGHT_SHIFT,
    RIGHT_ALT,
    RIGHT_GUI,
];

/// Translates a virtual key to the device's native keystroke code.
///
/// Letters fold to lowercase ASCII and digits keep their ASCII value.
/// Returns [`UNSUPPORTED`] for anything else not in the control, arrow or
/// function key tables.
pub fn virtual_to_native(virtual_key: u16) -> u8 {
    match virtual_key {
        vk::KEY_A..=vk::KEY_Z => (virtual_key - vk::KEY_A) as u8 + b'a',
        vk::DIGIT_0..=vk::DIGIT_9 => (virtual_key - vk::DIGIT_0) as u8 + b'0',
        vk::F1..=vk::F12 => (virtual_key - vk::F1) as u8 + F1,
        vk::BACK => BACKSPACE,
        vk::TAB => TAB,
        vk::RETURN => RETURN,
        vk::ESCAPE => ESC,
        vk::SPACE => b' ',
        vk::LEFT => LEFT_ARROW,
        vk::UP => UP_ARROW,
        vk::RIGHT => RIGHT_ARROW,
        vk::DOWN => DOWN_ARROW,
        _ => UNSUPPORTED,
    }
}

/// Native keystrokes for every modifier set in `flags`, lowest bit first.
pub fn modifier_keys(flags: ModifierFlags) -> impl Iterator<Item = u8> {
    MODIFIER_KEYS
        .into_iter()
        .enumerate()
        .filter(move |&(bit, _)| flags.0 & (1 << bit) != 0)
        .map(|(_, key)| key)
}
