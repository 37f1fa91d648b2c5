//! # hidlink-core
//!
//! Shared library for hidlink containing the serial frame codec, the
//! byte-at-a-time frame parser, the per-link session controller, and the key
//! code translation tables.
//!
//! This crate is used by both the device runtime and the host driver.
//! It has zero dependencies on OS APIs, serial drivers, or network sockets:
//! bytes and time are always supplied by the caller.
//!
//! # Architecture overview
//!
//! hidlink lets a host computer drive a peripheral's mouse and keyboard over
//! an unreliable byte-oriented link (a UART, a USB CDC port, or a TCP bridge
//! to either).  The host sends *command frames*; the device answers with
//! *event frames*.
//!
//! - **`protocol`** – How bytes travel over the link.  Frames are
//!   `kind, len_lo, len_hi, payload.., [timestamp x4], checksum`, checked with
//!   an 8-bit XOR.  The [`FrameParser`] reassembles frames one byte at a time
//!   and resynchronises on garbage without losing the stream.
//!
//! - **`session`** – The [`SessionController`] owns one parser per link,
//!   applies the stalled-frame timeout, and keeps per-link counters.
//!
//! - **`keymap`** – Translation between USB HID scan codes, the
//!   platform-neutral virtual-key space, and the device's native keystroke
//!   codes.

pub mod keymap;
pub mod protocol;
pub mod session;

pub use keymap::{KeyTranslator, UNSUPPORTED};
pub use protocol::checksum::{checksum, verify_checksum};
pub use protocol::codec::{decode_command, decode_event, encode_command, encode_event, encode_frame, encode_raw};
pub use protocol::messages::{
    Command, CommandKind, Direction, Event, EventKind, Frame, FrameKind, ProtocolError,
    MAX_PAYLOAD,
};
pub use protocol::parser::{FrameParser, FrameRejection, ParseOutcome, ParserState};
pub use session::{Clock, LinkEvent, LinkStats, ManualClock, MonotonicClock, SessionController};
