//! 8-bit XOR checksum shared by both framing directions.
//!
//! The checksum is the running bitwise XOR of every byte, seeded at zero.
//! When building a frame it covers the header, the payload, and (for event
//! frames) the timestamp.  When verifying, it is recomputed over everything
//! except the trailing checksum byte and compared.

/// Computes the XOR checksum of `bytes`.
///
/// An empty slice yields `0x00`.
///
/// # Examples
///
/// ```rust
/// use hidlink_core::checksum;
///
/// assert_eq!(checksum(&[0x12, 0x34, 0x56, 0x78]), 0x08);
/// assert_eq!(checksum(&[]), 0x00);
/// ```
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Verifies a complete encoded frame whose last byte is the checksum.
///
/// Returns `false` for an empty slice, since there is no checksum byte to
/// compare against.
pub fn verify_checksum(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((&stored, body)) => checksum(body) == stored,
        None => false,
    }
}
