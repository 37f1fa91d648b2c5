//! USB HID keyboard scan codes (Usage Page 0x07) and their translation to
//! virtual keys.
//!
//! # What is a scan code? (for beginners)
//!
//! A physical keyboard reports each key by its *position*, not by the
//! character printed on it.  The USB HID standard numbers these positions:
//! the key labelled A on a US layout is `0x04`, B is `0x05`, and so on.
//! The device captures these codes and converts them to the platform-neutral
//! virtual-key space (see [`super::vk`]) before sending them to the host.
//!
//! # How this table works
//!
//! `SCAN_TO_VIRTUAL` is a compile-time array of 256 virtual-key values indexed
//! by scan code.  Letters, digits and F-keys are filled by loops; control and
//! arrow keys are placed one by one because their codes have no arithmetic
//! relationship.  Every other slot holds [`UNSUPPORTED`](super::UNSUPPORTED).
//!
//! Note the digit row: HID numbers it `1, 2, .. 9, 0`, so the *last* code of
//! the run (`0x27`) is the zero key.

use super::vk;

/// Named scan codes used by the translation table.
pub mod usage {
    pub const KEY_A: u8 = 0x04;
    pub const KEY_Z: u8 = 0x1D;
    pub const DIGIT_1: u8 = 0x1E;
    pub const DIGIT_9: u8 = 0x26;
    pub const DIGIT_0: u8 = 0x27;
    pub const ENTER: u8 = 0x28;
    pub const ESCAPE: u8 = 0x29;
    pub const BACKSPACE: u8 = 0x2A;
    pub const TAB: u8 = 0x2B;
    pub const SPACE: u8 = 0x2C;
    pub const F1: u8 = 0x3A;
    pub const F12: u8 = 0x45;
    // The device numbers its arrow cluster 0x52..=0x55 in this order.
    pub const ARROW_UP: u8 = 0x52;
    pub const ARROW_LEFT: u8 = 0x53;
    pub const ARROW_DOWN: u8 = 0x54;
    pub const ARROW_RIGHT: u8 = 0x55;
}

/// Translates a HID scan code to a virtual key.
///
/// Returns [`UNSUPPORTED`](super::UNSUPPORTED) for codes outside the
/// supported set.  Never panics.
pub fn scan_to_virtual(scan_code: u8) -> u16 {
    SCAN_TO_VIRTUAL[scan_code as usize]
}

/// Scan code → virtual key, indexed by scan code.
const SCAN_TO_VIRTUAL: [u16; 256] = {
    use usage::*;
    let mut t = [super::UNSUPPORTED; 256];

    // ── Letters (0x04–0x1D → 'A'–'Z') ────────────────────────────────────────
    let mut i = 0;
    while i <= (KEY_Z - KEY_A) {
        t[(KEY_A + i) as usize] = vk::KEY_A + i as u16;
        i += 1;
    }

    // ── Digit row (0x1E–0x26 → '1'–'9', 0x27 → '0') ─────────────────────────
    let mut i = 0;
    while i <= (DIGIT_9 - DIGIT_1) {
        t[(DIGIT_1 + i) as usize] = vk::DIGIT_1 + i as u16;
        i += 1;
    }
    t[DIGIT_0 as usize] = vk::DIGIT_0;

    // ── Control keys ─────────────────────────────────────────────────────────
    t[ENTER as usize] = vk::RETURN;
    t[ESCAPE as usize] = vk::ESCAPE;
    t[BACKSPACE as usize] = vk::BACK;
    t[TAB as usize] = vk::TAB;
    t[SPACE as usize] = vk::SPACE;

    // ── Function keys (0x3A–0x45 → F1–F12) ───────────────────────────────────
    let mut i = 0;
    while i <= (F12 - F1) {
        t[(F1 + i) as usize] = vk::F1 + i as u16;
        i += 1;
    }

    // ── Arrows ───────────────────────────────────────────────────────────────
    t[ARROW_UP as usize] = vk::UP;
    t[ARROW_LEFT as usize] = vk::LEFT;
    t[ARROW_DOWN as usize] = vk::DOWN;
    t[ARROW_RIGHT as usize] = vk::RIGHT;

    t
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::UNSUPPORTED;

    /// (scan code, expected virtual key), in decimal as the device firmware lists them.
    const KNOWN_MAPPINGS: &[(u8, u16)] = &[
        (4, 0x41), (5, 0x42), (29, 0x5A),
        (30, 0x31), (31, 0x32), (38, 0x39), (39, 0x30),
        (40, 0x0D), (41, 0x1B), (42, 0x08), (43, 0x09), (44, 0x20),
        (58, 0x70), (63, 0x75), (69, 0x7B),
        (82, 0x26), (83, 0x25), (84, 0x28), (85, 0x27),
    ];

    #[test]
    fn test_known_scan_codes_map_to_expected_virtual_keys() {
        for &(scan, expected) in KNOWN_MAPPINGS {
            assert_eq!(
                scan_to_virtual(scan),
                expected,
                "scan code {scan} should map to 0x{expected:02X}"
            );
        }
    }

    #[test]
    fn test_every_letter_maps_to_uppercase_ascii() {
        for (offset, scan) in (usage::KEY_A..=usage::KEY_Z).enumerate() {
            assert_eq!(scan_to_virtual(scan), u16::from(b'A') + offset as u16);
        }
    }

    #[test]
    fn test_digit_row_wraps_to_zero() {
        assert_eq!(scan_to_virtual(usage::DIGIT_9), u16::from(b'9'));
        assert_eq!(scan_to_virtual(usage::DIGIT_0), u16::from(b'0'));
    }

    #[test]
    fn test_unmapped_scan_codes_are_unsupported() {
        for scan in [0x00, 0x01, 0x03, 0x2D, 0x39, 0x46, 0x4F, 0x51, 0x56, 0xE0, 0xFF] {
            assert_eq!(scan_to_virtual(scan), UNSUPPORTED, "scan code 0x{scan:02X}");
        }
    }
}
