//! ExecuteCommandUseCase: turns frames delivered by a link into HID actions.
//!
//! This use case sits at the application layer.  It decodes each command
//! frame, translates virtual keys into the device's native keystrokes, and
//! drives an [`HidEmulator`] trait object.  The emulator implementations live
//! in the infrastructure layer.
//!
//! The use case never touches the link itself.  Every call returns an
//! [`Execution`] telling the link loop what to do next: nothing, send an
//! event back, or pause before reading the next command.

use std::sync::Arc;
use std::time::Duration;

use hidlink_core::keymap::native;
use hidlink_core::protocol::messages::{
    ButtonAction, ErrorCode, KeyAction, ModifierFlags, MouseButton, StatusReport,
    PROTOCOL_VERSION,
};
use hidlink_core::{
    decode_command, Command, Event, Frame, FrameRejection, KeyTranslator, LinkEvent, LinkStats,
    ProtocolError,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error type for HID emulation operations.
#[derive(Debug, Error)]
pub enum EmulationError {
    #[error("device error: {0}")]
    Device(String),
}

/// Error type for executing a single command.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("malformed command: {0}")]
    Malformed(#[from] ProtocolError),
    #[error("virtual key 0x{0:04X} has no native keystroke")]
    UnsupportedKey(u16),
    #[error("emulation failed: {0}")]
    Emulation(#[from] EmulationError),
}

impl ExecutionError {
    /// The error code reported to the host for this failure.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ExecutionError::Malformed(_) => ErrorCode::MalformedPayload,
            ExecutionError::UnsupportedKey(_) => ErrorCode::UnsupportedKey,
            ExecutionError::Emulation(_) => ErrorCode::EmulationFailed,
        }
    }
}

/// The device's mouse and keyboard emulation layer.
///
/// Keys are native keystroke codes (see [`hidlink_core::keymap::native`]).
#[cfg_attr(test, mockall::automock)]
pub trait HidEmulator: Send + Sync {
    /// Moves the cursor to an absolute position.
    fn move_absolute(&self, x: u16, y: u16) -> Result<(), EmulationError>;

    /// Moves the cursor by a signed delta.
    fn move_relative(&self, dx: i16, dy: i16) -> Result<(), EmulationError>;

    fn press_button(&self, button: MouseButton) -> Result<(), EmulationError>;

    fn release_button(&self, button: MouseButton) -> Result<(), EmulationError>;

    /// Presses and releases a mouse button.
    fn click_button(&self, button: MouseButton) -> Result<(), EmulationError>;

    fn press_key(&self, key: u8) -> Result<(), EmulationError>;

    fn release_key(&self, key: u8) -> Result<(), EmulationError>;

    /// Releases every key currently held.
    fn release_all(&self) -> Result<(), EmulationError>;

    /// Types a string verbatim.
    fn type_text(&self, text: &str) -> Result<(), EmulationError>;
}

/// What the link loop should do after a frame has been handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution {
    /// Nothing to send.
    Done,
    /// Send this event back to the host.
    Respond(Event),
    /// Pause the command stream for this long.
    Wait(Duration),
}

/// The Execute Command use case.
///
/// One instance exists per link; it owns that link's recording flag.
pub struct ExecuteCommandUseCase {
    emulator: Arc<dyn HidEmulator>,
    recording: bool,
}

impl ExecuteCommandUseCase {
    /// Creates a new use case driving the given emulator.
    pub fn new(emulator: Arc<dyn HidEmulator>) -> Self {
        Self {
            emulator,
            recording: false,
        }
    }

    /// Returns `true` while captured input should be streamed to the host.
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Handles anything the session controller reported.
    ///
    /// Frames are executed; rejected and stalled frames are reported to the
    /// host as error events.  Execution failures are also turned into error
    /// events, so this never fails.
    pub fn handle_link_event(&mut self, event: LinkEvent, stats: &LinkStats) -> Execution {
        match event {
            LinkEvent::Frame(frame) => self.handle_frame(&frame, stats),
            LinkEvent::Rejected(rejection) => Execution::Respond(rejection_event(rejection)),
            LinkEvent::Stalled { .. } => Execution::Respond(Event::Error {
                code: ErrorCode::Timeout,
                detail: 0,
            }),
        }
    }

    /// Decodes and executes one command frame.
    pub fn handle_frame(&mut self, frame: &Frame, stats: &LinkStats) -> Execution {
        let kind = frame.kind().as_byte();
        let result = decode_command(frame)
            .map_err(ExecutionError::from)
            .and_then(|cmd| self.execute(&cmd, stats));

        match result {
            Ok(execution) => execution,
            Err(e) => {
                warn!(kind, error = %e, "command failed");
                Execution::Respond(Event::Error {
                    code: e.error_code(),
                    detail: kind,
                })
            }
        }
    }

    /// Executes a decoded command.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::UnsupportedKey`] for a virtual key with no
    /// native keystroke, or [`ExecutionError::Emulation`] if the emulator fails.
    pub fn execute(&mut self, cmd: &Command, stats: &LinkStats) -> Result<Execution, ExecutionError> {
        debug!(?cmd, "executing command");
        match *cmd {
            Command::MouseMoveAbsolute { x, y } => self.emulator.move_absolute(x, y)?,
            Command::MouseMoveRelative { dx, dy } => self.emulator.move_relative(dx, dy)?,
            Command::MouseClick { button, action } => match action {
                ButtonAction::Click => self.emulator.click_button(button)?,
                ButtonAction::Press => self.emulator.press_button(button)?,
                ButtonAction::Release => self.emulator.release_button(button)?,
            },
            Command::KeyboardText(ref text) => self.emulator.type_text(text)?,
            Command::KeyPress {
                virtual_key,
                modifiers,
                action,
            } => self.key_press(virtual_key, modifiers, action)?,
            Command::Delay { millis } => {
                return Ok(Execution::Wait(Duration::from_millis(u64::from(millis))));
            }
            Command::StartRecording => {
                self.recording = true;
                info!("recording started");
                return Ok(Execution::Respond(self.status(stats)));
            }
            Command::StopRecording => {
                self.recording = false;
                info!("recording stopped");
                return Ok(Execution::Respond(self.status(stats)));
            }
            Command::StatusQuery => return Ok(Execution::Respond(self.status(stats))),
        }
        Ok(Execution::Done)
    }

    /// Builds a status response for this link.
    pub fn status(&self, stats: &LinkStats) -> Event {
        Event::StatusResponse(StatusReport {
            protocol_version: PROTOCOL_VERSION,
            recording: self.recording,
            frames_accepted: saturate(stats.frames_accepted),
            frames_rejected: saturate(stats.frames_rejected()),
        })
    }

    fn key_press(
        &self,
        virtual_key: u16,
        modifiers: ModifierFlags,
        action: KeyAction,
    ) -> Result<(), ExecutionError> {
        let key = KeyTranslator::virtual_to_native(virtual_key);
        if key == native::UNSUPPORTED {
            return Err(ExecutionError::UnsupportedKey(virtual_key));
        }

        match action {
            KeyAction::Tap => {
                self.press_chord(key, modifiers)?;
                self.emulator.release_all()?;
            }
            KeyAction::Press => self.press_chord(key, modifiers)?,
            KeyAction::Release => {
                self.emulator.release_key(key)?;
                for modifier in native::modifier_keys(modifiers) {
                    self.emulator.release_key(modifier)?;
                }
            }
        }
        Ok(())
    }

    /// Presses the modifiers, then the key.  On failure every key is released
    /// so no modifier is left held.
    fn press_chord(&self, key: u8, modifiers: ModifierFlags) -> Result<(), EmulationError> {
        let pressed = native::modifier_keys(modifiers)
            .chain(std::iter::once(key))
            .try_for_each(|k| self.emulator.press_key(k));
        if let Err(e) = pressed {
            if let Err(release) = self.emulator.release_all() {
                warn!(error = %release, "failed to release keys after a failed press");
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Maps a parser rejection onto the error event sent to the host.
pub fn rejection_event(rejection: FrameRejection) -> Event {
    let code = match rejection {
        FrameRejection::LengthViolation { .. } => ErrorCode::LengthViolation,
        FrameRejection::ChecksumMismatch { .. } => ErrorCode::ChecksumMismatch,
        FrameRejection::Timeout { .. } => ErrorCode::Timeout,
    };
    Event::Error { code, detail: 0 }
}

fn saturate(count: u64) -> u16 {
    u16::try_from(count).unwrap_or(u16::MAX)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use hidlink_core::encode_command;
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn use_case(mock: MockHidEmulator) -> ExecuteCommandUseCase {
        ExecuteCommandUseCase::new(Arc::new(mock))
    }

    fn frame(cmd: &Command) -> Frame {
        encode_command(cmd).unwrap()
    }

    // ── Mouse ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_absolute_move_calls_move_absolute() {
        // Arrange
        let mut mock = MockHidEmulator::new();
        mock.expect_move_absolute()
            .with(eq(100), eq(200))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut uc = use_case(mock);

        // Act
        let result = uc.handle_frame(
            &frame(&Command::MouseMoveAbsolute { x: 100, y: 200 }),
            &LinkStats::default(),
        );

        // Assert
        assert_eq!(result, Execution::Done);
    }

    #[test]
    fn test_relative_move_calls_move_relative() {
        let mut mock = MockHidEmulator::new();
        mock.expect_move_relative()
            .with(eq(-5), eq(3))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut uc = use_case(mock);

        let result = uc.execute(&Command::MouseMoveRelative { dx: -5, dy: 3 }, &LinkStats::default());

        assert_eq!(result.unwrap(), Execution::Done);
    }

    #[test]
    fn test_click_actions_map_to_button_calls() {
        // Arrange
        let mut mock = MockHidEmulator::new();
        mock.expect_click_button().with(eq(MouseButton::Left)).times(1).returning(|_| Ok(()));
        mock.expect_press_button().with(eq(MouseButton::Right)).times(1).returning(|_| Ok(()));
        mock.expect_release_button().with(eq(MouseButton::Right)).times(1).returning(|_| Ok(()));
        let mut uc = use_case(mock);
        let stats = LinkStats::default();

        // Act / Assert
        for (button, action) in [
            (MouseButton::Left, ButtonAction::Click),
            (MouseButton::Right, ButtonAction::Press),
            (MouseButton::Right, ButtonAction::Release),
        ] {
            assert_eq!(
                uc.execute(&Command::MouseClick { button, action }, &stats).unwrap(),
                Execution::Done
            );
        }
    }

    // ── Keyboard ──────────────────────────────────────────────────────────────

    #[test]
    fn test_text_is_typed_verbatim() {
        let mut mock = MockHidEmulator::new();
        mock.expect_type_text()
            .withf(|text: &str| text == "Hello")
            .times(1)
            .returning(|_| Ok(()));
        let mut uc = use_case(mock);

        let result = uc.execute(&Command::KeyboardText("Hello".into()), &LinkStats::default());

        assert!(result.is_ok());
    }

    #[test]
    fn test_key_tap_presses_modifiers_then_key_then_releases_all() {
        // Arrange: Ctrl+Shift+A
        let mut mock = MockHidEmulator::new();
        let mut seq = Sequence::new();
        mock.expect_press_key()
            .with(eq(native::LEFT_CTRL))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_press_key()
            .with(eq(native::LEFT_SHIFT))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_press_key()
            .with(eq(b'a'))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_release_all()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        let mut uc = use_case(mock);

        // Act
        let result = uc.execute(
            &Command::KeyPress {
                virtual_key: 0x41,
                modifiers: ModifierFlags(ModifierFlags::LEFT_CTRL | ModifierFlags::LEFT_SHIFT),
                action: KeyAction::Tap,
            },
            &LinkStats::default(),
        );

        // Assert
        assert_eq!(result.unwrap(), Execution::Done);
    }

    #[test]
    fn test_failed_key_press_releases_held_modifiers() {
        // Arrange: Ctrl goes down, then the key itself fails.
        let mut mock = MockHidEmulator::new();
        let mut seq = Sequence::new();
        mock.expect_press_key()
            .with(eq(native::LEFT_CTRL))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_press_key()
            .with(eq(b'a'))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(EmulationError::Device("usb stall".into())));
        mock.expect_release_all()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        let mut uc = use_case(mock);

        // Act
        let result = uc.execute(
            &Command::KeyPress {
                virtual_key: 0x41,
                modifiers: ModifierFlags(ModifierFlags::LEFT_CTRL),
                action: KeyAction::Tap,
            },
            &LinkStats::default(),
        );

        // Assert
        assert!(matches!(
            result,
            Err(ExecutionError::Emulation(EmulationError::Device(ref msg))) if msg == "usb stall"
        ));
    }

    #[test]
    fn test_failed_modifier_on_held_press_still_releases() {
        let mut mock = MockHidEmulator::new();
        mock.expect_press_key()
            .with(eq(native::LEFT_SHIFT))
            .times(1)
            .returning(|_| Err(EmulationError::Device("report dropped".into())));
        mock.expect_release_all()
            .times(1)
            .returning(|| Err(EmulationError::Device("still stalled".into())));
        let mut uc = use_case(mock);

        let result = uc.execute(
            &Command::KeyPress {
                virtual_key: 0x41,
                modifiers: ModifierFlags(ModifierFlags::LEFT_SHIFT),
                action: KeyAction::Press,
            },
            &LinkStats::default(),
        );

        // The press error wins over the release error.
        assert!(matches!(
            result,
            Err(ExecutionError::Emulation(EmulationError::Device(ref msg))) if msg == "report dropped"
        ));
    }

    #[test]
    fn test_key_release_releases_key_then_modifiers() {
        let mut mock = MockHidEmulator::new();
        let mut seq = Sequence::new();
        mock.expect_release_key()
            .with(eq(native::RETURN))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_release_key()
            .with(eq(native::LEFT_ALT))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        let mut uc = use_case(mock);

        let result = uc.execute(
            &Command::KeyPress {
                virtual_key: 0x0D,
                modifiers: ModifierFlags(ModifierFlags::LEFT_ALT),
                action: KeyAction::Release,
            },
            &LinkStats::default(),
        );

        assert!(result.is_ok());
    }

    #[test]
    fn test_unsupported_virtual_key_is_reported_without_emulator_calls() {
        // Arrange: no expectations, so any emulator call would panic.
        let mut uc = use_case(MockHidEmulator::new());
        let cmd = Command::KeyPress {
            virtual_key: 0x91,
            modifiers: ModifierFlags::default(),
            action: KeyAction::Tap,
        };

        // Act
        let result = uc.handle_frame(&frame(&cmd), &LinkStats::default());

        // Assert
        assert_eq!(
            result,
            Execution::Respond(Event::Error {
                code: ErrorCode::UnsupportedKey,
                detail: 0x05
            })
        );
    }

    // ── Control commands ──────────────────────────────────────────────────────

    #[test]
    fn test_delay_returns_wait() {
        let mut uc = use_case(MockHidEmulator::new());
        let result = uc.execute(&Command::Delay { millis: 250 }, &LinkStats::default());
        assert_eq!(result.unwrap(), Execution::Wait(Duration::from_millis(250)));
    }

    #[test]
    fn test_start_and_stop_recording_toggle_flag_and_report_status() {
        // Arrange
        let mut uc = use_case(MockHidEmulator::new());
        let stats = LinkStats {
            frames_accepted: 3,
            checksum_mismatches: 1,
            ..LinkStats::default()
        };

        // Act
        let started = uc.execute(&Command::StartRecording, &stats).unwrap();
        let recording_after_start = uc.is_recording();
        let stopped = uc.execute(&Command::StopRecording, &stats).unwrap();

        // Assert
        assert!(recording_after_start);
        assert!(!uc.is_recording());
        assert_eq!(
            started,
            Execution::Respond(Event::StatusResponse(StatusReport {
                protocol_version: PROTOCOL_VERSION,
                recording: true,
                frames_accepted: 3,
                frames_rejected: 1,
            }))
        );
        assert!(matches!(
            stopped,
            Execution::Respond(Event::StatusResponse(StatusReport { recording: false, .. }))
        ));
    }

    #[test]
    fn test_status_counts_saturate() {
        let uc = use_case(MockHidEmulator::new());
        let stats = LinkStats {
            frames_accepted: 1_000_000,
            ..LinkStats::default()
        };
        match uc.status(&stats) {
            Event::StatusResponse(report) => assert_eq!(report.frames_accepted, u16::MAX),
            other => panic!("unexpected event {other:?}"),
        }
    }

    // ── Failures ──────────────────────────────────────────────────────────────

    #[test]
    fn test_emulator_failure_becomes_error_event() {
        let mut mock = MockHidEmulator::new();
        mock.expect_move_absolute()
            .returning(|_, _| Err(EmulationError::Device("usb stalled".into())));
        let mut uc = use_case(mock);

        let result = uc.handle_frame(
            &frame(&Command::MouseMoveAbsolute { x: 1, y: 1 }),
            &LinkStats::default(),
        );

        assert_eq!(
            result,
            Execution::Respond(Event::Error {
                code: ErrorCode::EmulationFailed,
                detail: 0x01
            })
        );
    }

    #[test]
    fn test_malformed_payload_becomes_error_event() {
        // Arrange: a mouse-move frame with a 3-byte payload.
        let bad = Frame::command(hidlink_core::CommandKind::MouseMoveAbsolute, vec![0, 1, 2]).unwrap();
        let mut uc = use_case(MockHidEmulator::new());

        // Act
        let result = uc.handle_frame(&bad, &LinkStats::default());

        // Assert
        assert_eq!(
            result,
            Execution::Respond(Event::Error {
                code: ErrorCode::MalformedPayload,
                detail: 0x01
            })
        );
    }

    #[test]
    fn test_link_rejections_map_to_error_codes() {
        let mut uc = use_case(MockHidEmulator::new());
        let stats = LinkStats::default();

        let length = uc.handle_link_event(
            LinkEvent::Rejected(FrameRejection::LengthViolation { declared: 511 }),
            &stats,
        );
        let checksum = uc.handle_link_event(
            LinkEvent::Rejected(FrameRejection::ChecksumMismatch { expected: 1, received: 2 }),
            &stats,
        );
        let stalled = uc.handle_link_event(LinkEvent::Stalled { elapsed_ms: 6_000 }, &stats);

        assert_eq!(
            length,
            Execution::Respond(Event::Error { code: ErrorCode::LengthViolation, detail: 0 })
        );
        assert_eq!(
            checksum,
            Execution::Respond(Event::Error { code: ErrorCode::ChecksumMismatch, detail: 0 })
        );
        assert_eq!(
            stalled,
            Execution::Respond(Event::Error { code: ErrorCode::Timeout, detail: 0 })
        );
    }
}
