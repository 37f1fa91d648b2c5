//! Virtual-key codes exchanged on the wire.
//!
//! These follow the familiar desktop virtual-key numbering: letters are their
//! uppercase ASCII code, digits their ASCII code, and the rest use the
//! conventional `VK_*` values.

pub const BACK: u16 = 0x08;
pub const TAB: u16 = 0x09;
pub const RETURN: u16 = 0x0D;
pub const ESCAPE: u16 = 0x1B;
pub const SPACE: u16 = 0x20;

pub const LEFT: u16 = 0x25;
pub const UP: u16 = 0x26;
pub const RIGHT: u16 = 0x27;
pub const DOWN: u16 = 0x28;

pub const DIGIT_0: u16 = 0x30;
pub const DIGIT_1: u16 = 0x31;
pub const DIGIT_9: u16 = 0x39;

pub const KEY_A: u16 = 0x41;
pub const KEY_Z: u16 = 0x5A;

pub const F1: u16 = 0x70;
pub const F12: u16 = 0x7B;

/// Parses a key name as used in scripts and on the command line.
///
/// Accepts single letters or digits (`a`, `7`), function keys (`f5`), and the
/// named keys `enter`, `esc`, `backspace`, `tab`, `space`, `up`, `down`,
/// `left`, `right`.  Matching is case-insensitive.
pub fn from_name(name: &str) -> Option<u16> {
    let lower = name.to_ascii_lowercase();
    let named = match lower.as_str() {
        "enter" | "return" => Some(RETURN),
        "esc" | "escape" => Some(ESCAPE),
        "backspace" | "back" => Some(BACK),
        "tab" => Some(TAB),
        "space" => Some(SPACE),
        "up" => Some(UP),
        "down" => Some(DOWN),
        "left" => Some(LEFT),
        "right" => Some(RIGHT),
        _ => None,
    };
    if named.is_some() {
        return named;
    }

    let bytes = lower.as_bytes();
    if bytes.len() == 1 {
        return match bytes[0] {
            c @ b'a'..=b'z' => Some(u16::from(c.to_ascii_uppercase())),
            c @ b'0'..=b'9' => Some(u16::from(c)),
            _ => None,
        };
    }

    let n: u16 = lower.strip_prefix('f')?.parse().ok()?;
    (1..=12).contains(&n).then(|| F1 + n - 1)
}
