//! Frame encoder and typed payload codec.
//!
//! Wire format:
//! ```text
//! command: [kind:1][len:2 LE][payload:len][checksum:1]
//! event:   [kind:1][len:2 LE][payload:len][timestamp:4 LE][checksum:1]
//! ```
//! The checksum is the XOR of every byte written before it.

use crate::protocol::checksum::checksum;
use crate::protocol::messages::{
    check_payload_len, ButtonAction, Command, CommandKind, ErrorCode, Event, EventKind, Frame,
    FrameKind, KeyAction, ModifierFlags, MouseButton, ProtocolError, StatusReport, HEADER_SIZE,
    CHECKSUM_SIZE, TIMESTAMP_SIZE,
};

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a frame from a raw kind byte.
///
/// The only validation performed is the payload length; the caller is
/// responsible for supplying a meaningful `kind`.  Pass `Some(timestamp)` to
/// build an event frame and `None` to build a command frame.
///
/// # Errors
///
/// Returns [`ProtocolError::PayloadTooLarge`] if `payload` exceeds
/// [`MAX_PAYLOAD`](crate::protocol::messages::MAX_PAYLOAD).
///
/// # Examples
///
/// ```rust
/// use hidlink_core::encode_raw;
///
/// // START_RECORDING with no payload.
/// let bytes = encode_raw(0x10, &[], None).unwrap();
/// assert_eq!(bytes, vec![0x10, 0x00, 0x00, 0x10]);
/// ```
pub fn encode_raw(kind: u8, payload: &[u8], timestamp: Option<u32>) -> Result<Vec<u8>, ProtocolError> {
    check_payload_len(payload.len())?;
    let ts_len = if timestamp.is_some() { TIMESTAMP_SIZE } else { 0 };
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len() + ts_len + CHECKSUM_SIZE);

    buf.push(kind);
    buf.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    buf.extend_from_slice(payload);
    if let Some(ts) = timestamp {
        buf.extend_from_slice(&ts.to_le_bytes());
    }
    buf.push(checksum(&buf));
    Ok(buf)
}

/// Encodes an already-built [`Frame`].
///
/// Infallible because every `Frame` constructor has already enforced the
/// payload limit.
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let mut buf = Vec::with_capacity(frame.encoded_len());
    buf.push(frame.kind().as_byte());
    buf.extend_from_slice(&(frame.payload().len() as u16).to_le_bytes());
    buf.extend_from_slice(frame.payload());
    if let Some(ts) = frame.timestamp() {
        buf.extend_from_slice(&ts.to_le_bytes());
    }
    buf.push(checksum(&buf));
    buf
}

/// Builds the command frame for a typed [`Command`].
///
/// # Errors
///
/// Returns [`ProtocolError::PayloadTooLarge`] for keyboard text longer than
/// the payload limit.
pub fn encode_command(cmd: &Command) -> Result<Frame, ProtocolError> {
    Frame::command(cmd.kind(), encode_command_payload(cmd))
}

/// Builds the event frame for a typed [`Event`] stamped with `timestamp`.
///
/// # Errors
///
/// Never fails for the current event set; the `Result` mirrors
/// [`encode_command`].
pub fn encode_event(event: &Event, timestamp: u32) -> Result<Frame, ProtocolError> {
    Frame::event(event.kind(), encode_event_payload(event), timestamp)
}

/// Decodes the payload of a command frame into a typed [`Command`].
///
/// # Errors
///
/// Returns [`ProtocolError::UnexpectedDirection`] for event frames and
/// [`ProtocolError::MalformedPayload`] if the payload does not match the
/// layout for its kind.
pub fn decode_command(frame: &Frame) -> Result<Command, ProtocolError> {
    let kind = match frame.kind() {
        FrameKind::Command(kind) => kind,
        FrameKind::Event(kind) => return Err(ProtocolError::UnexpectedDirection(kind as u8)),
    };
    let p = frame.payload();

    match kind {
        CommandKind::MouseMoveAbsolute => {
            require_exact(p, 4, "MouseMoveAbsolute")?;
            Ok(Command::MouseMoveAbsolute {
                x: u16::from_be_bytes([p[0], p[1]]),
                y: u16::from_be_bytes([p[2], p[3]]),
            })
        }
        CommandKind::MouseMoveRelative => {
            require_exact(p, 4, "MouseMoveRelative")?;
            Ok(Command::MouseMoveRelative {
                dx: i16::from_be_bytes([p[0], p[1]]),
                dy: i16::from_be_bytes([p[2], p[3]]),
            })
        }
        CommandKind::MouseClick => {
            require_exact(p, 2, "MouseClick")?;
            Ok(Command::MouseClick {
                button: read_button(p[0])?,
                action: read_button_action(p[1])?,
            })
        }
        CommandKind::KeyboardText => {
            if p.is_empty() {
                return Err(ProtocolError::MalformedPayload(
                    "KeyboardText: empty text".to_string(),
                ));
            }
            let text = std::str::from_utf8(p)
                .map_err(|e| ProtocolError::MalformedPayload(format!("KeyboardText: invalid UTF-8: {e}")))?;
            Ok(Command::KeyboardText(text.to_string()))
        }
        CommandKind::KeyPress => {
            require_exact(p, 4, "KeyPress")?;
            Ok(Command::KeyPress {
                virtual_key: u16::from_be_bytes([p[0], p[1]]),
                modifiers: ModifierFlags(p[2]),
                action: read_key_action(p[3])?,
            })
        }
        CommandKind::Delay => {
            require_exact(p, 2, "Delay")?;
            Ok(Command::Delay {
                millis: u16::from_be_bytes([p[0], p[1]]),
            })
        }
        CommandKind::StartRecording => require_empty(p, "StartRecording").map(|_| Command::StartRecording),
        CommandKind::StopRecording => require_empty(p, "StopRecording").map(|_| Command::StopRecording),
        CommandKind::StatusQuery => require_empty(p, "StatusQuery").map(|_| Command::StatusQuery),
    }
}

/// Decodes the payload of an event frame into a typed [`Event`].
///
/// # Errors
///
/// Returns [`ProtocolError::UnexpectedDirection`] for command frames and
/// [`ProtocolError::MalformedPayload`] if the payload does not match the
/// layout for its kind.
pub fn decode_event(frame: &Frame) -> Result<Event, ProtocolError> {
    let kind = match frame.kind() {
        FrameKind::Event(kind) => kind,
        FrameKind::Command(kind) => return Err(ProtocolError::UnexpectedDirection(kind as u8)),
    };
    let p = frame.payload();

    match kind {
        EventKind::MouseMove => {
            require_exact(p, 4, "MouseMove")?;
            Ok(Event::MouseMove {
                dx: i16::from_be_bytes([p[0], p[1]]),
                dy: i16::from_be_bytes([p[2], p[3]]),
            })
        }
        EventKind::MouseClick => {
            require_exact(p, 2, "MouseClick")?;
            Ok(Event::MouseClick {
                button: read_button(p[0])?,
                action: read_button_action(p[1])?,
            })
        }
        EventKind::KeyboardInput => {
            require_exact(p, 4, "KeyboardInput")?;
            Ok(Event::KeyboardInput {
                virtual_key: u16::from_be_bytes([p[0], p[1]]),
                modifiers: ModifierFlags(p[2]),
                action: read_key_action(p[3])?,
            })
        }
        EventKind::StatusResponse => {
            require_exact(p, 6, "StatusResponse")?;
            Ok(Event::StatusResponse(StatusReport {
                protocol_version: p[0],
                recording: p[1] != 0,
                frames_accepted: u16::from_be_bytes([p[2], p[3]]),
                frames_rejected: u16::from_be_bytes([p[4], p[5]]),
            }))
        }
        EventKind::Error => {
            require_exact(p, 2, "Error")?;
            let code = ErrorCode::try_from(p[0])
                .map_err(|_| ProtocolError::MalformedPayload(format!("unknown error code: {}", p[0])))?;
            Ok(Event::Error { code, detail: p[1] })
        }
    }
}

// ── Payload encoding ──────────────────────────────────────────────────────────

fn encode_command_payload(cmd: &Command) -> Vec<u8> {
    let mut buf = Vec::new();
    match cmd {
        Command::MouseMoveAbsolute { x, y } => {
            buf.extend_from_slice(&x.to_be_bytes());
            buf.extend_from_slice(&y.to_be_bytes());
        }
        Command::MouseMoveRelative { dx, dy } => {
            buf.extend_from_slice(&dx.to_be_bytes());
            buf.extend_from_slice(&dy.to_be_bytes());
        }
        Command::MouseClick { button, action } => {
            buf.push(*button as u8);
            buf.push(*action as u8);
        }
        Command::KeyboardText(text) => buf.extend_from_slice(text.as_bytes()),
        Command::KeyPress {
            virtual_key,
            modifiers,
            action,
        } => {
            buf.extend_from_slice(&virtual_key.to_be_bytes());
            buf.push(modifiers.0);
            buf.push(*action as u8);
        }
        Command::Delay { millis } => buf.extend_from_slice(&millis.to_be_bytes()),
        Command::StartRecording | Command::StopRecording | Command::StatusQuery => {} // empty payload
    }
    buf
}

fn encode_event_payload(event: &Event) -> Vec<u8> {
    let mut buf = Vec::new();
    match event {
        Event::MouseMove { dx, dy } => {
            buf.extend_from_slice(&dx.to_be_bytes());
            buf.extend_from_slice(&dy.to_be_bytes());
        }
        Event::MouseClick { button, action } => {
            buf.push(*button as u8);
            buf.push(*action as u8);
        }
        Event::KeyboardInput {
            virtual_key,
            modifiers,
            action,
        } => {
            buf.extend_from_slice(&virtual_key.to_be_bytes());
            buf.push(modifiers.0);
            buf.push(*action as u8);
        }
        Event::StatusResponse(report) => {
            buf.push(report.protocol_version);
            buf.push(u8::from(report.recording));
            buf.extend_from_slice(&report.frames_accepted.to_be_bytes());
            buf.extend_from_slice(&report.frames_rejected.to_be_bytes());
        }
        Event::Error { code, detail } => {
            buf.push(*code as u8);
            buf.push(*detail);
        }
    }
    buf
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn require_exact(p: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if p.len() != needed {
        return Err(ProtocolError::MalformedPayload(format!(
            "{context}: expected {needed} bytes, got {}",
            p.len()
        )));
    }
    Ok(())
}

fn require_empty(p: &[u8], context: &str) -> Result<(), ProtocolError> {
    require_exact(p, 0, context)
}

fn read_button(b: u8) -> Result<MouseButton, ProtocolError> {
    MouseButton::try_from(b)
        .map_err(|_| ProtocolError::MalformedPayload(format!("unknown mouse button: {b}")))
}

fn read_button_action(b: u8) -> Result<ButtonAction, ProtocolError> {
    ButtonAction::try_from(b)
        .map_err(|_| ProtocolError::MalformedPayload(format!("unknown button action: {b}")))
}

fn read_key_action(b: u8) -> Result<KeyAction, ProtocolError> {
    KeyAction::try_from(b)
        .map_err(|_| ProtocolError::MalformedPayload(format!("unknown key action: {b}")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
