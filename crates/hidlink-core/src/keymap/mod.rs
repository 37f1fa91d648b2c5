//! Key code translation tables.
//!
//! Three code spaces meet in hidlink:
//!
//! - **scan codes** ([`hid`]): USB HID positions reported by a physical keyboard
//!   attached to the device,
//! - **virtual keys** ([`vk`]): what travels on the wire,
//! - **native keystrokes** ([`native`]): what the device's keyboard emulation
//!   layer injects.
//!
//! Both maps are total: an input outside the supported set yields the
//! `0` sentinel instead of an error.

pub mod hid;
pub mod native;
pub mod vk;

/// Virtual key returned for unsupported scan codes.
pub const UNSUPPORTED: u16 = 0;

/// Unified translator providing all translation directions.
pub struct KeyTranslator;

impl KeyTranslator {
    /// Translates a HID scan code to a virtual key, or [`UNSUPPORTED`].
    pub fn scan_to_virtual(scan_code: u8) -> u16 {
        hid::scan_to_virtual(scan_code)
    }

    /// Translates a virtual key to a native keystroke, or
    /// [`native::UNSUPPORTED`].
    pub fn virtual_to_native(virtual_key: u16) -> u8 {
        native::virtual_to_native(virtual_key)
    }

    /// Composes both maps.
    pub fn scan_to_native(scan_code: u8) -> u8 {
        match hid::scan_to_virtual(scan_code) {
            UNSUPPORTED => native::UNSUPPORTED,
            virtual_key => native::virtual_to_native(virtual_key),
        }
    }
}
