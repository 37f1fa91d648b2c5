//! Host side of a link: sends command frames and decodes event frames.
//!
//! # Why buffer events?
//!
//! Events arrive in whatever order the device produces them.  While the host
//! waits for a status response, the device may also be streaming captured
//! input.  Anything that is not the awaited response is kept in an internal
//! queue and handed out later by [`DeviceConnection::next_event`], so nothing
//! is lost.
//!
//! # Matching answers
//!
//! The device only answers commands that fail, so an error event can arrive
//! long after the command that caused it.  An error counts as the answer to
//! the awaited command only if it arrived after that command was sent and
//! its detail byte is that command's kind.  Any other error belongs to an
//! earlier command: it is logged and left in the queue, where
//! [`DeviceConnection::take_errors`] collects it.

use std::collections::VecDeque;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use hidlink_core::protocol::messages::{ErrorCode, StatusReport};
use hidlink_core::{
    decode_event, encode_command, encode_frame, Command, CommandKind, Direction, Event, LinkEvent,
    MonotonicClock, ProtocolError, SessionController,
};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, trace, warn};

const READ_BUFFER_SIZE: usize = 512;

/// Error type for host-side link operations.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to connect to device at {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("no answer from device within {0:?}")]
    Timeout(Duration),

    #[error("device closed the link")]
    Closed,

    #[error("device reported {code:?} (detail 0x{detail:02X})")]
    Device { code: ErrorCode, detail: u8 },
}

/// An event together with the device timestamp it was stamped with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    pub event: Event,
    /// Device clock in milliseconds, wrapping at `u32::MAX`.
    pub timestamp: u32,
}

impl fmt::Display for TimedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>10}] ", self.timestamp)?;
        match &self.event {
            Event::MouseMove { dx, dy } => write!(f, "mouse move dx={dx} dy={dy}"),
            Event::MouseClick { button, action } => write!(f, "mouse {button:?} {action:?}"),
            Event::KeyboardInput {
                virtual_key,
                modifiers,
                action,
            } => write!(
                f,
                "key 0x{virtual_key:02X} modifiers=0x{:02X} {action:?}",
                modifiers.0
            ),
            Event::StatusResponse(report) => write!(
                f,
                "status v{} recording={} accepted={} rejected={}",
                report.protocol_version,
                report.recording,
                report.frames_accepted,
                report.frames_rejected
            ),
            Event::Error { code, detail } => write!(f, "error {code:?} detail=0x{detail:02X}"),
        }
    }
}

/// One link to a device, over any byte stream.
pub struct DeviceConnection<R, W> {
    reader: R,
    writer: W,
    session: SessionController<MonotonicClock>,
    pending: VecDeque<TimedEvent>,
    buf: [u8; READ_BUFFER_SIZE],
}

impl DeviceConnection<OwnedReadHalf, OwnedWriteHalf> {
    /// Opens a TCP link to a device (or its serial bridge).
    ///
    /// # Errors
    ///
    /// Returns [`HostError::ConnectFailed`] if the connection is refused.
    pub async fn connect(addr: SocketAddr) -> Result<Self, HostError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| HostError::ConnectFailed { addr, source })?;
        stream.set_nodelay(true)?;
        info!("connected to device at {addr}");
        let (reader, writer) = stream.into_split();
        Ok(Self::new(reader, writer))
    }
}

impl<R, W> DeviceConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            session: SessionController::with_default_timeout(
                Direction::DeviceToHost,
                MonotonicClock::new(),
            ),
            pending: VecDeque::new(),
            buf: [0u8; READ_BUFFER_SIZE],
        }
    }

    /// Encodes and writes one command frame.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Protocol`] if the command cannot be encoded (for
    /// example text over the payload limit) and [`HostError::Io`] if the
    /// write fails.
    pub async fn send(&mut self, cmd: &Command) -> Result<(), HostError> {
        let frame = encode_command(cmd)?;
        self.writer.write_all(&encode_frame(&frame)).await?;
        self.writer.flush().await?;
        debug!(?cmd, "command sent");
        Ok(())
    }

    /// Returns the next event from the device, waiting at most `wait`.
    ///
    /// Corrupt or stalled frames from the device are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Timeout`] if no event arrives in time and
    /// [`HostError::Closed`] if the device hangs up.
    pub async fn next_event(&mut self, wait: Duration) -> Result<TimedEvent, HostError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }
            self.fill(deadline, wait).await?;
        }
    }

    /// Sends a command and, for commands the device answers, waits for the
    /// answer.
    ///
    /// Returns the status report for start/stop recording and status query,
    /// `None` for everything else.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Device`] if the device answers with an error event.
    pub async fn execute(
        &mut self,
        cmd: &Command,
        wait: Duration,
    ) -> Result<Option<StatusReport>, HostError> {
        let sent_at = self.pending.len();
        self.send(cmd).await?;
        match cmd {
            Command::StartRecording | Command::StopRecording | Command::StatusQuery => self
                .await_status(cmd.kind() as u8, sent_at, wait)
                .await
                .map(Some),
            _ => Ok(None),
        }
    }

    /// Asks the device for its status.
    ///
    /// The device handles frames in order, so once this returns every error
    /// caused by earlier commands has been queued.
    pub async fn query_status(&mut self, wait: Duration) -> Result<StatusReport, HostError> {
        let sent_at = self.pending.len();
        self.send(&Command::StatusQuery).await?;
        self.await_status(CommandKind::StatusQuery as u8, sent_at, wait)
            .await
    }

    /// Removes and returns every queued error event, oldest first.
    pub fn take_errors(&mut self) -> Vec<TimedEvent> {
        let (errors, rest): (VecDeque<_>, VecDeque<_>) = self
            .pending
            .drain(..)
            .partition(|e| matches!(e.event, Event::Error { .. }));
        self.pending = rest;
        errors.into()
    }

    /// Waits for the answer to a command of `kind`, looking only at events
    /// queued from index `from` on.
    async fn await_status(
        &mut self,
        kind: u8,
        from: usize,
        wait: Duration,
    ) -> Result<StatusReport, HostError> {
        let deadline = Instant::now() + wait;
        let mut next = from;
        loop {
            while next < self.pending.len() {
                let answer = match self.pending[next].event {
                    Event::StatusResponse(report) => Ok(report),
                    Event::Error { code, detail } if detail == kind => {
                        Err(HostError::Device { code, detail })
                    }
                    Event::Error { code, detail } => {
                        warn!(?code, detail, "device reported an error for an earlier command");
                        next += 1;
                        continue;
                    }
                    _ => {
                        next += 1;
                        continue;
                    }
                };
                self.pending.remove(next);
                return answer;
            }
            self.fill(deadline, wait).await?;
        }
    }

    /// Reads one chunk from the device and queues every event it completes.
    async fn fill(&mut self, deadline: Instant, wait: Duration) -> Result<(), HostError> {
        let n = match timeout_at(deadline, self.reader.read(&mut self.buf)).await {
            Ok(read) => read?,
            Err(_) => {
                if let Some(stalled) = self.session.poll_timeout() {
                    warn!(?stalled, "device frame stalled");
                }
                return Err(HostError::Timeout(wait));
            }
        };
        if n == 0 {
            return Err(HostError::Closed);
        }

        for link_event in self.session.feed(&self.buf[..n]) {
            match link_event {
                LinkEvent::Frame(frame) => {
                    let Some(timestamp) = frame.timestamp() else {
                        continue;
                    };
                    match decode_event(&frame) {
                        Ok(event) => {
                            trace!(?event, timestamp, "event received");
                            self.pending.push_back(TimedEvent { event, timestamp });
                        }
                        Err(e) => warn!("undecodable event frame: {e}"),
                    }
                }
                LinkEvent::Rejected(rejection) => warn!(%rejection, "dropped corrupt event frame"),
                LinkEvent::Stalled { elapsed_ms } => warn!(elapsed_ms, "device frame stalled"),
            }
        }
        Ok(())
    }
}
