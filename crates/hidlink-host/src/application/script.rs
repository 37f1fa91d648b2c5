//! The hidlink script language.
//!
//! A script is plain text, one command per line:
//!
//! ```text
//! # comments and blank lines are ignored
//! move 100 200            absolute cursor position
//! rmove -5 3              relative cursor movement
//! click left              left|right|middle, optional press|release
//! type Hello, world       rest of the line typed verbatim
//! key 0x0D                virtual key by hex code...
//! key A ctrl shift        ...or by name, with modifiers, optional press|release
//! delay 250               pause the device's command stream (ms)
//! record start            start|stop streaming captured input
//! status                  ask the device for a status report
//! ```
//!
//! The same argument parsers back the CLI subcommands, so `hidlink-host key
//! A ctrl` and a script line `key A ctrl` mean exactly the same thing.

use hidlink_core::keymap::vk;
use hidlink_core::protocol::messages::{ButtonAction, KeyAction, ModifierFlags, MouseButton};
use hidlink_core::{Command, MAX_PAYLOAD};
use thiserror::Error;

/// Why an argument or script line could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("{command}: expected {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },

    #[error("{command}: unexpected argument {arg:?}")]
    UnexpectedArgument { command: &'static str, arg: String },

    #[error("invalid {what}: {value:?}")]
    InvalidValue { what: &'static str, value: String },

    #[error("text of {len} bytes exceeds the {max}-byte frame limit")]
    TextTooLong { len: usize, max: usize },

    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<ScriptError>,
    },
}

/// One parsed script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    /// 1-based source line.
    pub line: usize,
    pub command: Command,
}

/// Parses a whole script.
///
/// # Errors
///
/// Returns the first line's error wrapped in [`ScriptError::AtLine`].
pub fn parse_script(source: &str) -> Result<Vec<ScriptStep>, ScriptError> {
    let mut steps = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        match parse_line(raw) {
            Ok(Some(command)) => steps.push(ScriptStep { line, command }),
            Ok(None) => {}
            Err(e) => {
                return Err(ScriptError::AtLine {
                    line,
                    source: Box::new(e),
                })
            }
        }
    }
    Ok(steps)
}

/// Parses one line.  Returns `Ok(None)` for blank lines and comments.
pub fn parse_line(raw: &str) -> Result<Option<Command>, ScriptError> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match word.to_ascii_lowercase().as_str() {
        "move" => {
            let [x, y] = exact_args::<2>("move", "<x> <y>", &args)?;
            Command::MouseMoveAbsolute {
                x: parse_int("x coordinate", x)?,
                y: parse_int("y coordinate", y)?,
            }
        }
        "rmove" => {
            let [dx, dy] = exact_args::<2>("rmove", "<dx> <dy>", &args)?;
            Command::MouseMoveRelative {
                dx: parse_int("dx", dx)?,
                dy: parse_int("dy", dy)?,
            }
        }
        "click" => {
            let (button, rest) = args.split_first().ok_or(ScriptError::MissingArgument {
                command: "click",
                expected: "left|right|middle",
            })?;
            let action = match rest {
                [] => ButtonAction::Click,
                [action] => parse_button_action(action)?,
                [_, extra, ..] => return Err(unexpected("click", extra)),
            };
            Command::MouseClick {
                button: parse_button(button)?,
                action,
            }
        }
        // Text keeps its inner whitespace.
        "type" => text_command(rest.trim_start())?,
        "key" => {
            let (key, rest) = args.split_first().ok_or(ScriptError::MissingArgument {
                command: "key",
                expected: "<key> [modifier ...] [press|release]",
            })?;
            key_command(key, rest)?
        }
        "delay" => {
            let [millis] = exact_args::<1>("delay", "<milliseconds>", &args)?;
            Command::Delay {
                millis: parse_int("delay", millis)?,
            }
        }
        "record" => {
            let [state] = exact_args::<1>("record", "start|stop", &args)?;
            match state.to_ascii_lowercase().as_str() {
                "start" | "on" => Command::StartRecording,
                "stop" | "off" => Command::StopRecording,
                _ => return Err(invalid("record state", state)),
            }
        }
        "status" => {
            exact_args::<0>("status", "no arguments", &args)?;
            Command::StatusQuery
        }
        _ => return Err(ScriptError::UnknownCommand(word.to_string())),
    };
    Ok(Some(command))
}

// ── Argument parsers shared with the CLI ──────────────────────────────────────

pub fn parse_button(token: &str) -> Result<MouseButton, ScriptError> {
    match token.to_ascii_lowercase().as_str() {
        "left" | "l" => Ok(MouseButton::Left),
        "right" | "r" => Ok(MouseButton::Right),
        "middle" | "m" => Ok(MouseButton::Middle),
        _ => Err(invalid("mouse button", token)),
    }
}

pub fn parse_button_action(token: &str) -> Result<ButtonAction, ScriptError> {
    match token.to_ascii_lowercase().as_str() {
        "click" => Ok(ButtonAction::Click),
        "press" | "down" => Ok(ButtonAction::Press),
        "release" | "up" => Ok(ButtonAction::Release),
        _ => Err(invalid("button action", token)),
    }
}

/// Parses a virtual key given by name (`a`, `enter`, `f5`) or by hex code
/// (`0x0D`).
pub fn parse_virtual_key(token: &str) -> Result<u16, ScriptError> {
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        return u16::from_str_radix(hex, 16).map_err(|_| invalid("virtual key", token));
    }
    vk::from_name(token).ok_or_else(|| invalid("virtual key", token))
}

/// Builds a key command from a key token and trailing modifier/action
/// tokens.  Without an explicit `press` or `release` the key is tapped.
pub fn key_command<S: AsRef<str>>(key: &str, rest: &[S]) -> Result<Command, ScriptError> {
    let virtual_key = parse_virtual_key(key)?;
    let mut modifiers = 0u8;
    let mut action = None;

    for token in rest {
        let token: &str = token.as_ref();
        match token.to_ascii_lowercase().as_str() {
            "press" | "release" if action.is_some() => return Err(unexpected("key", token)),
            "press" => action = Some(KeyAction::Press),
            "release" => action = Some(KeyAction::Release),
            _ => {
                modifiers |= ModifierFlags::bit_for_name(token)
                    .ok_or_else(|| invalid("modifier", token))?;
            }
        }
    }

    Ok(Command::KeyPress {
        virtual_key,
        modifiers: ModifierFlags(modifiers),
        action: action.unwrap_or(KeyAction::Tap),
    })
}

/// Builds a text command, refusing text that cannot fit in one frame.
pub fn text_command(text: &str) -> Result<Command, ScriptError> {
    if text.is_empty() {
        return Err(ScriptError::MissingArgument {
            command: "type",
            expected: "<text>",
        });
    }
    if text.len() > MAX_PAYLOAD {
        return Err(ScriptError::TextTooLong {
            len: text.len(),
            max: MAX_PAYLOAD,
        });
    }
    Ok(Command::KeyboardText(text.to_string()))
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn exact_args<'a, const N: usize>(
    command: &'static str,
    expected: &'static str,
    args: &[&'a str],
) -> Result<[&'a str; N], ScriptError> {
    if args.len() > N {
        return Err(unexpected(command, args[N]));
    }
    <[&'a str; N]>::try_from(args).map_err(|_| ScriptError::MissingArgument { command, expected })
}

fn parse_int<T: std::str::FromStr>(what: &'static str, token: &str) -> Result<T, ScriptError> {
    token.parse().map_err(|_| invalid(what, token))
}

fn invalid(what: &'static str, value: &str) -> ScriptError {
    ScriptError::InvalidValue {
        what,
        value: value.to_string(),
    }
}

fn unexpected(command: &'static str, arg: &str) -> ScriptError {
    ScriptError::UnexpectedArgument {
        command,
        arg: arg.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(s: &str) -> Command {
        parse_line(s).unwrap().unwrap()
    }

    // ── Mouse ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_move_and_rmove() {
        assert_eq!(line("move 100 200"), Command::MouseMoveAbsolute { x: 100, y: 200 });
        assert_eq!(line("rmove -5 3"), Command::MouseMoveRelative { dx: -5, dy: 3 });
    }

    #[test]
    fn test_move_rejects_negative_absolute_position() {
        assert!(matches!(
            parse_line("move -1 0"),
            Err(ScriptError::InvalidValue { what: "x coordinate", .. })
        ));
    }

    #[test]
    fn test_click_defaults_to_click_action() {
        assert_eq!(
            line("click left"),
            Command::MouseClick {
                button: MouseButton::Left,
                action: ButtonAction::Click
            }
        );
        assert_eq!(
            line("click right down"),
            Command::MouseClick {
                button: MouseButton::Right,
                action: ButtonAction::Press
            }
        );
    }

    // ── Keyboard ──────────────────────────────────────────────────────────────

    #[test]
    fn test_type_keeps_inner_whitespace() {
        assert_eq!(line("type Hello,  world"), Command::KeyboardText("Hello,  world".into()));
    }

    #[test]
    fn test_type_at_frame_limit_and_beyond() {
        let ok = format!("type {}", "a".repeat(MAX_PAYLOAD));
        let too_long = format!("type {}", "a".repeat(MAX_PAYLOAD + 1));

        assert!(parse_line(&ok).is_ok());
        assert_eq!(
            parse_line(&too_long),
            Err(ScriptError::TextTooLong {
                len: MAX_PAYLOAD + 1,
                max: MAX_PAYLOAD
            })
        );
    }

    #[test]
    fn test_key_by_hex_and_by_name_with_modifiers() {
        // Arrange / Act
        let by_hex = line("key 0x0D");
        let by_name = line("key A ctrl shift");

        // Assert
        assert_eq!(
            by_hex,
            Command::KeyPress {
                virtual_key: vk::RETURN,
                modifiers: ModifierFlags::default(),
                action: KeyAction::Tap
            }
        );
        assert_eq!(
            by_name,
            Command::KeyPress {
                virtual_key: vk::KEY_A,
                modifiers: ModifierFlags(ModifierFlags::LEFT_CTRL | ModifierFlags::LEFT_SHIFT),
                action: KeyAction::Tap
            }
        );
    }

    #[test]
    fn test_key_up_arrow_is_a_key_not_an_action() {
        assert!(matches!(
            line("key up release"),
            Command::KeyPress { virtual_key: vk::UP, action: KeyAction::Release, .. }
        ));
    }

    #[test]
    fn test_key_rejects_unknown_modifier_and_double_action() {
        assert!(matches!(
            parse_line("key a hyper"),
            Err(ScriptError::InvalidValue { what: "modifier", .. })
        ));
        assert!(matches!(
            parse_line("key a press release"),
            Err(ScriptError::UnexpectedArgument { .. })
        ));
    }

    // ── Control ───────────────────────────────────────────────────────────────

    #[test]
    fn test_control_commands() {
        assert_eq!(line("delay 250"), Command::Delay { millis: 250 });
        assert_eq!(line("record start"), Command::StartRecording);
        assert_eq!(line("RECORD stop"), Command::StopRecording);
        assert_eq!(line("status"), Command::StatusQuery);
    }

    #[test]
    fn test_argument_count_errors() {
        assert_eq!(
            parse_line("move 1"),
            Err(ScriptError::MissingArgument {
                command: "move",
                expected: "<x> <y>"
            })
        );
        assert_eq!(
            parse_line("status now"),
            Err(ScriptError::UnexpectedArgument {
                command: "status",
                arg: "now".into()
            })
        );
    }

    // ── Scripts ───────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_script_skips_comments_and_records_lines() {
        // Arrange
        let source = "# login\nclick left\n\ntype hunter2\nkey enter\n";

        // Act
        let steps = parse_script(source).unwrap();

        // Assert
        let lines: Vec<usize> = steps.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![2, 4, 5]);
        assert_eq!(steps[1].command, Command::KeyboardText("hunter2".into()));
    }

    #[test]
    fn test_parse_script_reports_failing_line() {
        let err = parse_script("status\njump 3\n").unwrap_err();
        assert_eq!(err.to_string(), "line 2: unknown command \"jump\"");
    }
}
