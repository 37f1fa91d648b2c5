//! hidlink host driver: command-line entry point.
//!
//! # Usage
//!
//! ```text
//! hidlink-host [--device ADDR] [--timeout-ms MS] <COMMAND>
//!
//! Commands:
//!   move <x> <y>                      absolute cursor position
//!   rmove <dx> <dy>                   relative cursor movement
//!   click <button> [press|release]    mouse button
//!   type <text>...                    type text verbatim
//!   key <key> [modifier|press|release]...
//!   delay <ms>                        pause the device's command stream
//!   record <start|stop>               toggle input recording
//!   status                            print the device status
//!   monitor [--record]                print events until Ctrl+C
//!   run <script>                      execute a script file
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use hidlink_core::Command;
use hidlink_host::application::script::{
    key_command, parse_button, parse_button_action, parse_script, text_command, ScriptError,
};
use hidlink_host::infrastructure::device_conn::{DeviceConnection, HostError};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// hidlink host driver.
#[derive(Debug, Parser)]
#[command(
    name = "hidlink-host",
    about = "Drives a hidlink device's mouse and keyboard",
    version
)]
struct Cli {
    /// Address of the device's link bridge.
    #[arg(long, default_value = "127.0.0.1:24900", env = "HIDLINK_DEVICE")]
    device: SocketAddr,

    /// How long to wait for the device to answer, in milliseconds.
    #[arg(long, default_value_t = 2000, env = "HIDLINK_TIMEOUT_MS")]
    timeout_ms: u64,

    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Move the cursor to an absolute position.
    Move { x: u16, y: u16 },
    /// Move the cursor by a delta.
    Rmove {
        #[arg(allow_hyphen_values = true)]
        dx: i16,
        #[arg(allow_hyphen_values = true)]
        dy: i16,
    },
    /// Click, press, or release a mouse button.
    Click {
        button: String,
        action: Option<String>,
    },
    /// Type text verbatim.
    Type {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Tap, press, or release a key with optional modifiers.
    Key { key: String, rest: Vec<String> },
    /// Pause the device's command stream.
    Delay { millis: u16 },
    /// Start or stop streaming captured input.
    Record { state: RecordState },
    /// Print the device status.
    Status,
    /// Print device events until Ctrl+C.
    Monitor {
        /// Start recording first and stop it on exit.
        #[arg(long)]
        record: bool,
    },
    /// Execute a script file.
    Run { script: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RecordState {
    Start,
    Stop,
}

impl Action {
    /// Converts a single-command subcommand into its wire command.
    ///
    /// Returns `Ok(None)` for `monitor` and `run`, which are not one command.
    fn to_command(&self) -> Result<Option<Command>, ScriptError> {
        let cmd = match self {
            Action::Move { x, y } => Command::MouseMoveAbsolute { x: *x, y: *y },
            Action::Rmove { dx, dy } => Command::MouseMoveRelative { dx: *dx, dy: *dy },
            Action::Click { button, action } => Command::MouseClick {
                button: parse_button(button)?,
                action: match action {
                    Some(a) => parse_button_action(a)?,
                    None => hidlink_core::protocol::messages::ButtonAction::Click,
                },
            },
            Action::Type { text } => text_command(&text.join(" "))?,
            Action::Key { key, rest } => key_command(key, rest.as_slice())?,
            Action::Delay { millis } => Command::Delay { millis: *millis },
            Action::Record {
                state: RecordState::Start,
            } => Command::StartRecording,
            Action::Record {
                state: RecordState::Stop,
            } => Command::StopRecording,
            Action::Status => Command::StatusQuery,
            Action::Monitor { .. } | Action::Run { .. } => return Ok(None),
        };
        Ok(Some(cmd))
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let wait = Duration::from_millis(cli.timeout_ms);

    // Validate arguments before touching the network.
    let single = cli.action.to_command()?;
    let script = match &cli.action {
        Action::Run { script } => {
            let source = std::fs::read_to_string(script)
                .with_context(|| format!("failed to read script {}", script.display()))?;
            Some(parse_script(&source)?)
        }
        _ => None,
    };

    let mut conn = DeviceConnection::connect(cli.device).await?;

    if let Some(cmd) = single {
        print_report(conn.execute(&cmd, wait).await?);
        return confirm(&mut conn, wait).await;
    }

    if let Some(steps) = script {
        info!(steps = steps.len(), "running script");
        for step in &steps {
            debug!(line = step.line, command = ?step.command, "script step");
            let report = conn
                .execute(&step.command, wait)
                .await
                .with_context(|| format!("script line {} failed", step.line))?;
            print_report(report);
        }
        return confirm(&mut conn, wait).await;
    }

    if let Action::Monitor { record } = cli.action {
        monitor(&mut conn, record, wait).await?;
    }
    Ok(())
}

/// Round-trips a status query so every error the device raised for earlier
/// commands has arrived, then fails if there were any.
async fn confirm<R, W>(conn: &mut DeviceConnection<R, W>, wait: Duration) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    conn.query_status(wait)
        .await
        .context("device did not confirm the commands")?;
    let errors = conn.take_errors();
    for error in &errors {
        eprintln!("{error}");
    }
    if !errors.is_empty() {
        anyhow::bail!("device reported {} error(s)", errors.len());
    }
    Ok(())
}

fn print_report(report: Option<hidlink_core::protocol::messages::StatusReport>) {
    if let Some(report) = report {
        println!(
            "protocol v{} recording={} accepted={} rejected={}",
            report.protocol_version, report.recording, report.frames_accepted, report.frames_rejected
        );
    }
}

/// Prints every event until Ctrl+C or the device hangs up.
async fn monitor<R, W>(
    conn: &mut DeviceConnection<R, W>,
    record: bool,
    wait: Duration,
) -> Result<(), HostError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if record {
        conn.execute(&Command::StartRecording, wait).await?;
        info!("recording started");
    }

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            event = conn.next_event(Duration::from_secs(3600)) => match event {
                Ok(event) => println!("{event}"),
                Err(HostError::Timeout(_)) => continue,
                Err(e) => break Err(e),
            },
        }
    };

    if record && result.is_ok() {
        conn.execute(&Command::StopRecording, wait).await?;
        info!("recording stopped");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use hidlink_core::protocol::messages::{ButtonAction, KeyAction, ModifierFlags, MouseButton};

    fn action(args: &[&str]) -> Action {
        let mut argv = vec!["hidlink-host"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv).action
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["hidlink-host", "status"]);
        assert_eq!(cli.device, "127.0.0.1:24900".parse().unwrap());
        assert_eq!(cli.timeout_ms, 2000);
    }

    #[test]
    fn test_rmove_accepts_negative_deltas() {
        assert_eq!(
            action(&["rmove", "-5", "3"]).to_command().unwrap(),
            Some(Command::MouseMoveRelative { dx: -5, dy: 3 })
        );
    }

    #[test]
    fn test_type_joins_words() {
        assert_eq!(
            action(&["type", "Hello,", "world"]).to_command().unwrap(),
            Some(Command::KeyboardText("Hello, world".into()))
        );
    }

    #[test]
    fn test_key_and_click_share_script_parsing() {
        assert_eq!(
            action(&["key", "a", "ctrl", "press"]).to_command().unwrap(),
            Some(Command::KeyPress {
                virtual_key: 0x41,
                modifiers: ModifierFlags(ModifierFlags::LEFT_CTRL),
                action: KeyAction::Press,
            })
        );
        assert_eq!(
            action(&["click", "middle"]).to_command().unwrap(),
            Some(Command::MouseClick {
                button: MouseButton::Middle,
                action: ButtonAction::Click
            })
        );
    }

    #[test]
    fn test_invalid_button_is_an_error() {
        assert!(action(&["click", "thumb"]).to_command().is_err());
    }

    #[test]
    fn test_monitor_and_run_are_not_single_commands() {
        assert_eq!(action(&["monitor", "--record"]).to_command().unwrap(), None);
        assert_eq!(action(&["run", "login.hl"]).to_command().unwrap(), None);
    }

    #[test]
    fn test_record_state_values() {
        assert_eq!(
            action(&["record", "stop"]).to_command().unwrap(),
            Some(Command::StopRecording)
        );
    }
}
