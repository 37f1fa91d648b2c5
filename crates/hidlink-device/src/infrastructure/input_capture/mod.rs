//! Input capture infrastructure for the device runtime.
//!
//! On hardware, captured input comes from a USB host port the physical
//! keyboard and mouse are plugged into.  This module provides the
//! line-oriented stand-in used on a workstation: each line of text describes
//! one piece of input and is published on a `tokio::sync::broadcast` channel
//! that every link subscribes to.
//!
//! # Line format
//!
//! ```text
//! key <scan_code> down|up [modifier ...]    e.g. "key 0x04 down shift"
//! move <dx> <dy>                            e.g. "move -3 7"
//! button left|right|middle down|up          e.g. "button left down"
//! ```
//!
//! Numbers are decimal or `0x`-prefixed hex.  Blank lines and lines starting
//! with `#` are ignored.

use hidlink_core::protocol::messages::{ModifierFlags, MouseButton};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::application::capture_input::CapturedInput;

/// Parses one capture line.  Returns `None` for comments, blank lines, and
/// anything malformed.
pub fn parse_capture_line(line: &str) -> Option<CapturedInput> {
    let mut tokens = line.split_whitespace();
    match tokens.next()? {
        "key" => {
            let scan_code = parse_number(tokens.next()?)?;
            let scan_code = u8::try_from(scan_code).ok()?;
            let pressed = parse_pressed(tokens.next()?)?;
            let mut modifiers = 0u8;
            for name in tokens {
                modifiers |= ModifierFlags::bit_for_name(name)?;
            }
            Some(CapturedInput::Key {
                scan_code,
                modifiers: ModifierFlags(modifiers),
                pressed,
            })
        }
        "move" => {
            let dx = tokens.next()?.parse().ok()?;
            let dy = tokens.next()?.parse().ok()?;
            tokens.next().is_none().then_some(CapturedInput::MouseMove { dx, dy })
        }
        "button" => {
            let button = match tokens.next()? {
                "left" => MouseButton::Left,
                "right" => MouseButton::Right,
                "middle" => MouseButton::Middle,
                _ => return None,
            };
            let pressed = parse_pressed(tokens.next()?)?;
            tokens
                .next()
                .is_none()
                .then_some(CapturedInput::MouseButton { button, pressed })
        }
        _ => None,
    }
}

/// Reads capture lines until EOF and publishes each parsed input.
///
/// Returns the number of inputs published.  A send with no subscribed link
/// is not an error; the input is simply dropped.
pub async fn pump_lines<R>(
    reader: R,
    tx: broadcast::Sender<CapturedInput>,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut published = 0;

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some(input) = parse_capture_line(trimmed) else {
            warn!(line = trimmed, "ignoring unparsable capture line");
            continue;
        };
        match tx.send(input) {
            Ok(receivers) => trace!(?input, receivers, "captured input published"),
            Err(_) => trace!(?input, "no link subscribed; captured input dropped"),
        }
        published += 1;
    }

    debug!(published, "capture source reached end of input");
    Ok(published)
}

fn parse_number(token: &str) -> Option<u32> {
    match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => token.parse().ok(),
    }
}

fn parse_pressed(token: &str) -> Option<bool> {
    match token {
        "down" | "press" => Some(true),
        "up" | "release" => Some(false),
        _ => None,
    }
}
