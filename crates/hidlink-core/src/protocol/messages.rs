//! All hidlink frame kinds, the [`Frame`] container, and the typed
//! command/event payloads carried inside frames.
//!
//! Header integers (the payload length and the event timestamp) are
//! little-endian.  Integers *inside* payloads are big-endian, matching the
//! device firmware's payload layout (`x=100, y=200` is `00 64 00 C8`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Protocol version reported in status responses.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Largest payload a frame may carry.  A declared length of exactly this value
/// is legal; anything above it is a length violation.
pub const MAX_PAYLOAD: usize = 250;

/// Kind byte plus the two little-endian length bytes.
pub const HEADER_SIZE: usize = 3;

/// Size of the little-endian timestamp carried by event frames.
pub const TIMESTAMP_SIZE: usize = 4;

/// Size of the trailing XOR checksum.
pub const CHECKSUM_SIZE: usize = 1;

/// Largest legal frame on the wire (an event frame with a full payload).
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD + TIMESTAMP_SIZE + CHECKSUM_SIZE;

/// Default time allowed between the first byte of a frame and its checksum.
pub const DEFAULT_FRAME_TIMEOUT_MS: u64 = 5_000;

/// Errors that can occur while building or decoding frames and payloads.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The payload exceeds [`MAX_PAYLOAD`].
    #[error("payload of {len} bytes exceeds the {max}-byte maximum")]
    PayloadTooLarge { len: usize, max: usize },

    /// A frame of the wrong direction was handed to a typed decoder.
    #[error("frame kind 0x{0:02X} is not valid in this direction")]
    UnexpectedDirection(u8),

    /// The payload could not be parsed (wrong size, field value out of range, etc.).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

// ── Frame kinds ───────────────────────────────────────────────────────────────

/// Host→device command kinds.
///
/// `0xFF` is deliberately absent: it is reserved as the error indicator and is
/// never a valid incoming command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandKind {
    MouseMoveAbsolute = 0x01,
    MouseMoveRelative = 0x02,
    MouseClick = 0x03,
    KeyboardText = 0x04,
    KeyPress = 0x05,
    Delay = 0x06,
    StartRecording = 0x10,
    StopRecording = 0x11,
    StatusQuery = 0x20,
}

impl CommandKind {
    /// Every command kind, in wire order.
    pub const ALL: [CommandKind; 9] = [
        CommandKind::MouseMoveAbsolute,
        CommandKind::MouseMoveRelative,
        CommandKind::MouseClick,
        CommandKind::KeyboardText,
        CommandKind::KeyPress,
        CommandKind::Delay,
        CommandKind::StartRecording,
        CommandKind::StopRecording,
        CommandKind::StatusQuery,
    ];
}

impl TryFrom<u8> for CommandKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(CommandKind::MouseMoveAbsolute),
            0x02 => Ok(CommandKind::MouseMoveRelative),
            0x03 => Ok(CommandKind::MouseClick),
            0x04 => Ok(CommandKind::KeyboardText),
            0x05 => Ok(CommandKind::KeyPress),
            0x06 => Ok(CommandKind::Delay),
            0x10 => Ok(CommandKind::StartRecording),
            0x11 => Ok(CommandKind::StopRecording),
            0x20 => Ok(CommandKind::StatusQuery),
            _ => Err(()),
        }
    }
}

/// Device→host event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    MouseMove = 0x01,
    MouseClick = 0x02,
    KeyboardInput = 0x03,
    StatusResponse = 0x20,
    Error = 0xFF,
}

impl EventKind {
    /// Every event kind, in wire order.
    pub const ALL: [EventKind; 5] = [
        EventKind::MouseMove,
        EventKind::MouseClick,
        EventKind::KeyboardInput,
        EventKind::StatusResponse,
        EventKind::Error,
    ];
}

impl TryFrom<u8> for EventKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(EventKind::MouseMove),
            0x02 => Ok(EventKind::MouseClick),
            0x03 => Ok(EventKind::KeyboardInput),
            0x20 => Ok(EventKind::StatusResponse),
            0xFF => Ok(EventKind::Error),
            _ => Err(()),
        }
    }
}

/// Which way frames travel on a link.
///
/// The direction decides both the set of acceptable kind bytes and whether a
/// 4-byte timestamp sits between the payload and the checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Command frames: no timestamp.
    HostToDevice,
    /// Event frames: timestamp present.
    DeviceToHost,
}

impl Direction {
    /// Returns the [`FrameKind`] for `byte` if it is valid in this direction.
    pub fn accepts(self, byte: u8) -> Option<FrameKind> {
        match self {
            Direction::HostToDevice => CommandKind::try_from(byte).ok().map(FrameKind::Command),
            Direction::DeviceToHost => EventKind::try_from(byte).ok().map(FrameKind::Event),
        }
    }

    /// Returns `true` if frames in this direction carry a timestamp.
    pub fn carries_timestamp(self) -> bool {
        matches!(self, Direction::DeviceToHost)
    }
}

/// A command or event kind, tagged with its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    Command(CommandKind),
    Event(EventKind),
}

impl FrameKind {
    /// The kind byte as it appears on the wire.
    pub fn as_byte(self) -> u8 {
        match self {
            FrameKind::Command(kind) => kind as u8,
            FrameKind::Event(kind) => kind as u8,
        }
    }

    /// The direction this kind travels in.
    pub fn direction(self) -> Direction {
        match self {
            FrameKind::Command(_) => Direction::HostToDevice,
            FrameKind::Event(_) => Direction::DeviceToHost,
        }
    }
}

// ── Frame ─────────────────────────────────────────────────────────────────────

/// A validated unit of exchange on the wire.
///
/// A `Frame` is immutable: fields are only readable through accessors, and
/// every constructor enforces `payload.len() <= MAX_PAYLOAD`.  Event frames
/// always carry a timestamp; command frames never do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    kind: FrameKind,
    payload: Vec<u8>,
    timestamp: Option<u32>,
}

impl Frame {
    /// Builds a command frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] if `payload` exceeds [`MAX_PAYLOAD`].
    pub fn command(kind: CommandKind, payload: Vec<u8>) -> Result<Self, ProtocolError> {
        check_payload_len(payload.len())?;
        Ok(Self {
            kind: FrameKind::Command(kind),
            payload,
            timestamp: None,
        })
    }

    /// Builds an event frame stamped with `timestamp` (device milliseconds).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] if `payload` exceeds [`MAX_PAYLOAD`].
    pub fn event(kind: EventKind, payload: Vec<u8>, timestamp: u32) -> Result<Self, ProtocolError> {
        check_payload_len(payload.len())?;
        Ok(Self {
            kind: FrameKind::Event(kind),
            payload,
            timestamp: Some(timestamp),
        })
    }

    /// Assembles a frame whose length has already been checked by the parser.
    pub(crate) fn from_parts(kind: FrameKind, payload: Vec<u8>, timestamp: Option<u32>) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD);
        Self {
            kind,
            payload,
            timestamp,
        }
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The event timestamp, or `None` for command frames.
    pub fn timestamp(&self) -> Option<u32> {
        self.timestamp
    }

    /// Consumes the frame and returns its payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Number of bytes this frame occupies once encoded.
    pub fn encoded_len(&self) -> usize {
        let ts = if self.timestamp.is_some() { TIMESTAMP_SIZE } else { 0 };
        HEADER_SIZE + self.payload.len() + ts + CHECKSUM_SIZE
    }
}

pub(crate) fn check_payload_len(len: usize) -> Result<(), ProtocolError> {
    if len > MAX_PAYLOAD {
        return Err(ProtocolError::PayloadTooLarge {
            len,
            max: MAX_PAYLOAD,
        });
    }
    Ok(())
}

// ── Payload field types ───────────────────────────────────────────────────────

/// Active modifier keys, in USB HID boot-report bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct ModifierFlags(pub u8);

impl ModifierFlags {
    pub const LEFT_CTRL: u8 = 1 << 0;
    pub const LEFT_SHIFT: u8 = 1 << 1;
    pub const LEFT_ALT: u8 = 1 << 2;
    pub const LEFT_GUI: u8 = 1 << 3;
    pub const RIGHT_CTRL: u8 = 1 << 4;
    pub const RIGHT_SHIFT: u8 = 1 << 5;
    pub const RIGHT_ALT: u8 = 1 << 6;
    pub const RIGHT_GUI: u8 = 1 << 7;

    /// Looks up a modifier bit by name, case-insensitively.
    ///
    /// Bare names (`ctrl`, `shift`, `alt`, `gui`) mean the left-hand key;
    /// `rctrl`, `rshift`, `ralt`, `rgui` select the right-hand one.
    pub fn bit_for_name(name: &str) -> Option<u8> {
        let bit = match name.to_ascii_lowercase().as_str() {
            "ctrl" | "control" | "lctrl" => Self::LEFT_CTRL,
            "shift" | "lshift" => Self::LEFT_SHIFT,
            "alt" | "lalt" => Self::LEFT_ALT,
            "gui" | "win" | "cmd" | "super" | "lgui" => Self::LEFT_GUI,
            "rctrl" => Self::RIGHT_CTRL,
            "rshift" => Self::RIGHT_SHIFT,
            "ralt" | "altgr" => Self::RIGHT_ALT,
            "rgui" => Self::RIGHT_GUI,
            _ => return None,
        };
        Some(bit)
    }
}

/// Mouse button identifier, using the device mouse library's bit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MouseButton {
    Left = 0x01,
    Right = 0x02,
    Middle = 0x04,
}

impl TryFrom<u8> for MouseButton {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MouseButton::Left),
            0x02 => Ok(MouseButton::Right),
            0x04 => Ok(MouseButton::Middle),
            _ => Err(()),
        }
    }
}

/// What to do with a mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ButtonAction {
    /// Press and release.
    Click = 0x00,
    Press = 0x01,
    Release = 0x02,
}

impl TryFrom<u8> for ButtonAction {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ButtonAction::Click),
            0x01 => Ok(ButtonAction::Press),
            0x02 => Ok(ButtonAction::Release),
            _ => Err(()),
        }
    }
}

/// What to do with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyAction {
    /// Press and release.
    Tap = 0x00,
    Press = 0x01,
    Release = 0x02,
}

impl TryFrom<u8> for KeyAction {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(KeyAction::Tap),
            0x01 => Ok(KeyAction::Press),
            0x02 => Ok(KeyAction::Release),
            _ => Err(()),
        }
    }
}

/// Error codes carried by the `0xFF` error event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorCode {
    LengthViolation = 0x01,
    ChecksumMismatch = 0x02,
    Timeout = 0x03,
    MalformedPayload = 0x04,
    UnsupportedKey = 0x05,
    EmulationFailed = 0x06,
}

impl TryFrom<u8> for ErrorCode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(ErrorCode::LengthViolation),
            0x02 => Ok(ErrorCode::ChecksumMismatch),
            0x03 => Ok(ErrorCode::Timeout),
            0x04 => Ok(ErrorCode::MalformedPayload),
            0x05 => Ok(ErrorCode::UnsupportedKey),
            0x06 => Ok(ErrorCode::EmulationFailed),
            _ => Err(()),
        }
    }
}

/// Snapshot of device state returned in a status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusReport {
    pub protocol_version: u8,
    pub recording: bool,
    /// Frames accepted on this link, saturating at `u16::MAX`.
    pub frames_accepted: u16,
    /// Frames rejected or abandoned on this link, saturating at `u16::MAX`.
    pub frames_rejected: u16,
}

// ── Typed commands and events ─────────────────────────────────────────────────

/// A decoded host→device command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Move the cursor to an absolute position.
    MouseMoveAbsolute { x: u16, y: u16 },
    /// Move the cursor by a signed delta.
    MouseMoveRelative { dx: i16, dy: i16 },
    MouseClick { button: MouseButton, action: ButtonAction },
    /// Type a string verbatim.
    KeyboardText(String),
    /// Press, release, or tap a single virtual key with modifiers held.
    KeyPress {
        virtual_key: u16,
        modifiers: ModifierFlags,
        action: KeyAction,
    },
    /// Pause the command stream.
    Delay { millis: u16 },
    StartRecording,
    StopRecording,
    StatusQuery,
}

impl Command {
    /// The wire kind for this command.
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::MouseMoveAbsolute { .. } => CommandKind::MouseMoveAbsolute,
            Command::MouseMoveRelative { .. } => CommandKind::MouseMoveRelative,
            Command::MouseClick { .. } => CommandKind::MouseClick,
            Command::KeyboardText(_) => CommandKind::KeyboardText,
            Command::KeyPress { .. } => CommandKind::KeyPress,
            Command::Delay { .. } => CommandKind::Delay,
            Command::StartRecording => CommandKind::StartRecording,
            Command::StopRecording => CommandKind::StopRecording,
            Command::StatusQuery => CommandKind::StatusQuery,
        }
    }
}

/// A decoded device→host event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Relative movement captured from a physical mouse.
    MouseMove { dx: i16, dy: i16 },
    MouseClick { button: MouseButton, action: ButtonAction },
    /// A key captured from a physical keyboard, already translated to a virtual key.
    KeyboardInput {
        virtual_key: u16,
        modifiers: ModifierFlags,
        action: KeyAction,
    },
    StatusResponse(StatusReport),
    /// `detail` carries the offending kind byte, or zero when there is none.
    Error { code: ErrorCode, detail: u8 },
}

impl Event {
    /// The wire kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::MouseMove { .. } => EventKind::MouseMove,
            Event::MouseClick { .. } => EventKind::MouseClick,
            Event::KeyboardInput { .. } => EventKind::KeyboardInput,
            Event::StatusResponse(_) => EventKind::StatusResponse,
            Event::Error { .. } => EventKind::Error,
        }
    }
}
