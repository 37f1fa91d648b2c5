//! Link server: accepts host connections and runs one session per link.
//!
//! # How does a link work?
//!
//! The device exposes its serial port through a TCP bridge.  Each accepted
//! connection is one *link* with its own [`SessionController`], its own
//! recording flag, and its own tracing span tagged with a random link id.
//!
//! The per-link loop waits on three things at once with `tokio::select!`:
//!
//! 1. **Bytes from the host**, fed straight into the session controller.
//!    Every accepted, rejected, or stalled frame is handed to
//!    [`ExecuteCommandUseCase`] and any response is written back.
//! 2. **A periodic tick**, so a half-received frame is abandoned after the
//!    frame timeout even when the host goes quiet.  The tick also checks the
//!    shutdown flag.
//! 3. **Captured input** from the broadcast channel, forwarded as event
//!    frames while the link is recording.
//!
//! [`serve_link`] is generic over the stream type so tests can drive it with
//! an in-memory `tokio::io::duplex` pipe instead of a socket.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hidlink_core::{
    encode_event, encode_frame, Clock, Direction, Event, LinkStats, MonotonicClock, ProtocolError,
    SessionController,
};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::application::capture_input::{CaptureInputUseCase, CapturedInput};
use crate::application::execute_command::{ExecuteCommandUseCase, Execution, HidEmulator};
use crate::infrastructure::storage::config::LinkConfig;

/// Read buffer size for one socket read.
const READ_BUFFER_SIZE: usize = 512;

/// Error type for link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to bind link listener on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode event: {0}")]
    Encode(#[from] ProtocolError),
}

/// Per-link timing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    pub frame_timeout_ms: u64,
    pub poll_interval: Duration,
}

impl From<&LinkConfig> for LinkSettings {
    fn from(config: &LinkConfig) -> Self {
        Self {
            frame_timeout_ms: config.frame_timeout_ms,
            poll_interval: config.poll_interval(),
        }
    }
}

/// Accepts links on `bind` until `running` is cleared.
///
/// # Errors
///
/// Returns [`LinkError::BindFailed`] if the listener cannot be bound.  Errors
/// on individual links are logged and never end the accept loop.
pub async fn run_server(
    bind: SocketAddr,
    settings: LinkSettings,
    emulator: Arc<dyn HidEmulator>,
    captured: broadcast::Sender<CapturedInput>,
    running: Arc<AtomicBool>,
) -> Result<(), LinkError> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|source| LinkError::BindFailed { addr: bind, source })?;

    info!("link listener on {bind}");

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Short accept timeout so the running flag is checked regularly.
        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("set_nodelay failed for {peer}: {e}");
                }
                let link_id = Uuid::new_v4();
                let span = info_span!("link", %link_id, %peer);
                let emulator = Arc::clone(&emulator);
                let rx = captured.subscribe();
                let running = Arc::clone(&running);

                tokio::spawn(
                    async move {
                        info!("link opened");
                        match serve_link(stream, settings, MonotonicClock::new(), emulator, rx, running)
                            .await
                        {
                            Ok(stats) => info!(
                                accepted = stats.frames_accepted,
                                rejected = stats.frames_rejected(),
                                "link closed"
                            ),
                            Err(e) => warn!("link ended with error: {e}"),
                        }
                    }
                    .instrument(span),
                );
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {}
        }
    }

    Ok(())
}

/// Runs one link until the host disconnects or `running` is cleared.
///
/// Returns the link's final counters.
///
/// # Errors
///
/// Returns [`LinkError::Io`] if reading or writing the stream fails.
pub async fn serve_link<S, C>(
    stream: S,
    settings: LinkSettings,
    clock: C,
    emulator: Arc<dyn HidEmulator>,
    mut captured: broadcast::Receiver<CapturedInput>,
    running: Arc<AtomicBool>,
) -> Result<LinkStats, LinkError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: Clock,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut session =
        SessionController::new(Direction::HostToDevice, clock, settings.frame_timeout_ms);
    let mut executor = ExecuteCommandUseCase::new(emulator);
    let capture = CaptureInputUseCase::new();

    let mut ticker = interval(settings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut capture_open = true;
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    debug!("host closed the link");
                    break;
                }
                for event in session.feed(&buf[..n]) {
                    let execution = executor.handle_link_event(event, &session.stats());
                    let paused = matches!(execution, Execution::Wait(_));
                    apply(&mut writer, execution, stamp(session.clock())).await?;
                    if paused {
                        // The link was not reading while paused.
                        session.restart_frame_timer();
                    }
                }
            }
            _ = ticker.tick() => {
                if !running.load(Ordering::Relaxed) {
                    info!("shutdown flag set; closing link");
                    break;
                }
                if let Some(event) = session.poll_timeout() {
                    let execution = executor.handle_link_event(event, &session.stats());
                    apply(&mut writer, execution, stamp(session.clock())).await?;
                }
            }
            received = captured.recv(), if capture_open => match received {
                Ok(input) => {
                    if let Some(event) = capture.capture(&input, executor.is_recording()) {
                        send_event(&mut writer, &event, stamp(session.clock())).await?;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "capture stream lagged"),
                Err(RecvError::Closed) => {
                    debug!("capture source closed");
                    capture_open = false;
                }
            },
        }
    }

    writer.shutdown().await.ok();
    Ok(session.stats())
}

async fn apply<W>(writer: &mut W, execution: Execution, timestamp: u32) -> Result<(), LinkError>
where
    W: AsyncWrite + Unpin,
{
    match execution {
        Execution::Done => Ok(()),
        Execution::Respond(event) => send_event(writer, &event, timestamp).await,
        Execution::Wait(pause) => {
            debug!(?pause, "delaying command stream");
            tokio::time::sleep(pause).await;
            Ok(())
        }
    }
}

async fn send_event<W>(writer: &mut W, event: &Event, timestamp: u32) -> Result<(), LinkError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_event(event, timestamp)?;
    writer.write_all(&encode_frame(&frame)).await?;
    writer.flush().await?;
    debug!(kind = ?event.kind(), timestamp, "event sent");
    Ok(())
}

/// Event timestamps are the link clock in milliseconds, wrapping at `u32::MAX`.
fn stamp<C: Clock>(clock: &C) -> u32 {
    clock.now_millis() as u32
}
