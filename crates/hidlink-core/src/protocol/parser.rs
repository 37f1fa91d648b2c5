//! Byte-at-a-time frame parser.
//!
//! The parser consumes one inbound byte per call and reassembles a single
//! frame at a time.  It never blocks and never reads a clock itself: the
//! caller passes the current monotonic time in milliseconds with every byte.
//!
//! # State machine
//!
//! ```text
//!            valid kind
//!   Idle ──────────────▶ LengthLow ──▶ LengthHigh ──┬─ len > MAX ──▶ Rejected ─▶ Idle
//!    ▲  invalid kind:                               ├─ len == 0 ──▶ (Timestamp) ──▶ Checksum
//!    └─ discard, stay                               └─ len > 0  ──▶ Payload ──▶ (Timestamp) ──▶ Checksum
//!
//!   Checksum ── match ──▶ Complete ─▶ Idle
//!            └─ mismatch ▶ Rejected ─▶ Idle
//! ```
//!
//! The `Timestamp` state is only visited for device→host (event) frames.
//! `Complete` and `Rejected` are never observable as states: they are
//! reported through [`ParseOutcome`] and the parser has already reset to
//! [`ParserState::Idle`] by the time `push` returns.
//!
//! # Resynchronisation
//!
//! While idle, any byte that is not a valid kind for the configured
//! [`Direction`] is dropped without changing state.  After line noise or a
//! mid-frame connect the parser therefore skips garbage until something that
//! looks like a frame start arrives; a false start is flushed by the length
//! check, the checksum, or the timeout.

use thiserror::Error;
use tracing::{debug, trace};

use crate::protocol::checksum::checksum;
use crate::protocol::messages::{
    Direction, EventKind, Frame, FrameKind, MAX_FRAME_SIZE, MAX_PAYLOAD, TIMESTAMP_SIZE,
};

/// Why an in-progress frame was abandoned.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum FrameRejection {
    /// The declared payload length is larger than [`MAX_PAYLOAD`].
    #[error("declared payload length {declared} exceeds {max}", max = MAX_PAYLOAD)]
    LengthViolation { declared: u16 },

    /// The trailing checksum byte does not match the XOR of the frame.
    #[error("checksum mismatch: computed 0x{expected:02X}, received 0x{received:02X}")]
    ChecksumMismatch { expected: u8, received: u8 },

    /// The frame did not complete within the link timeout.
    #[error("frame stalled for {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },
}

/// Which field the parser is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// No frame in progress; the next byte must be a valid kind.
    Idle,
    LengthLow,
    LengthHigh,
    Payload,
    /// Event frames only.
    Timestamp,
    Checksum,
}

/// Result of pushing one byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The byte was not a valid kind while idle and was dropped.
    Discarded(u8),
    /// The byte was absorbed into the in-progress frame.
    Pending,
    /// A checksum-valid frame was completed.
    Complete(Frame),
    /// The in-progress frame was abandoned.
    Rejected(FrameRejection),
}

/// Streaming parser for one link.
///
/// Exactly one frame is ever in flight.  The raw buffer is allocated once and
/// reused for every frame.
#[derive(Debug)]
pub struct FrameParser {
    direction: Direction,
    state: ParserState,
    /// Every byte of the in-progress frame, checksum excluded.
    raw: Vec<u8>,
    /// Kind of the in-progress frame.  Set on the kind byte; holds the last
    /// frame's kind while idle and is never read there.
    kind: FrameKind,
    payload_len: usize,
    /// Bytes still expected in the current variable-length field.
    remaining: usize,
    started_at_ms: Option<u64>,
}

impl FrameParser {
    /// Creates an idle parser for frames travelling in `direction`.
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            state: ParserState::Idle,
            raw: Vec::with_capacity(MAX_FRAME_SIZE),
            kind: FrameKind::Event(EventKind::Error),
            payload_len: 0,
            remaining: 0,
            started_at_ms: None,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Returns `true` if at least one byte of a frame has been accepted.
    pub fn in_progress(&self) -> bool {
        self.state != ParserState::Idle
    }

    /// Time at which the in-progress frame's kind byte was accepted.
    pub fn started_at(&self) -> Option<u64> {
        self.started_at_ms
    }

    /// Number of bytes accumulated for the in-progress frame.
    pub fn buffered(&self) -> usize {
        self.raw.len()
    }

    /// Drops any in-progress frame and returns to [`ParserState::Idle`].
    pub fn reset(&mut self) {
        self.state = ParserState::Idle;
        self.raw.clear();
        self.payload_len = 0;
        self.remaining = 0;
        self.started_at_ms = None;
    }

    /// Restarts the in-progress frame's timeout window at `now_ms`.
    pub fn restart_timer(&mut self, now_ms: u64) {
        if self.started_at_ms.is_some() {
            self.started_at_ms = Some(now_ms);
        }
    }

    /// Abandons the in-progress frame if more than `timeout_ms` has elapsed
    /// since its first byte.
    ///
    /// Returns the rejection when a frame was abandoned.
    pub fn expire(&mut self, now_ms: u64, timeout_ms: u64) -> Option<FrameRejection> {
        let started = self.started_at_ms?;
        let elapsed_ms = now_ms.saturating_sub(started);
        if elapsed_ms <= timeout_ms {
            return None;
        }
        debug!(elapsed_ms, buffered = self.raw.len(), "abandoning stalled frame");
        self.reset();
        Some(FrameRejection::Timeout { elapsed_ms })
    }

    /// Feeds one byte into the state machine.
    pub fn push(&mut self, byte: u8, now_ms: u64) -> ParseOutcome {
        match self.state {
            ParserState::Idle => {
                let Some(kind) = self.direction.accepts(byte) else {
                    trace!(byte, "discarding byte outside the kind set");
                    return ParseOutcome::Discarded(byte);
                };
                self.raw.push(byte);
                self.kind = kind;
                self.started_at_ms = Some(now_ms);
                self.state = ParserState::LengthLow;
                ParseOutcome::Pending
            }
            ParserState::LengthLow => {
                self.raw.push(byte);
                self.state = ParserState::LengthHigh;
                ParseOutcome::Pending
            }
            ParserState::LengthHigh => {
                self.raw.push(byte);
                let declared = u16::from_le_bytes([self.raw[1], self.raw[2]]);
                if usize::from(declared) > MAX_PAYLOAD {
                    debug!(declared, "rejecting frame with oversized length");
                    self.reset();
                    return ParseOutcome::Rejected(FrameRejection::LengthViolation { declared });
                }
                self.payload_len = usize::from(declared);
                if self.payload_len > 0 {
                    self.remaining = self.payload_len;
                    self.state = ParserState::Payload;
                } else {
                    self.enter_trailer();
                }
                ParseOutcome::Pending
            }
            ParserState::Payload => {
                self.raw.push(byte);
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.enter_trailer();
                }
                ParseOutcome::Pending
            }
            ParserState::Timestamp => {
                self.raw.push(byte);
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.state = ParserState::Checksum;
                }
                ParseOutcome::Pending
            }
            ParserState::Checksum => self.finish(byte),
        }
    }

    /// Moves past the payload: to the timestamp for event frames, otherwise
    /// straight to the checksum.
    fn enter_trailer(&mut self) {
        if self.direction.carries_timestamp() {
            self.remaining = TIMESTAMP_SIZE;
            self.state = ParserState::Timestamp;
        } else {
            self.state = ParserState::Checksum;
        }
    }

    fn finish(&mut self, received: u8) -> ParseOutcome {
        let expected = checksum(&self.raw);
        if expected != received {
            debug!(expected, received, "rejecting frame with bad checksum");
            self.reset();
            return ParseOutcome::Rejected(FrameRejection::ChecksumMismatch { expected, received });
        }

        let kind = self.kind;
        let payload_end = 3 + self.payload_len;
        let payload = self.raw[3..payload_end].to_vec();
        let timestamp = self.direction.carries_timestamp().then(|| {
            u32::from_le_bytes([
                self.raw[payload_end],
                self.raw[payload_end + 1],
                self.raw[payload_end + 2],
                self.raw[payload_end + 3],
            ])
        });

        self.reset();
        ParseOutcome::Complete(Frame::from_parts(kind, payload, timestamp))
    }
}
