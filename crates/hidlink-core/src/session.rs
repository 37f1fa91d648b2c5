//! Per-link session control.
//!
//! A [`SessionController`] owns exactly one [`FrameParser`] and is the only
//! thing that feeds it.  It reads the current time from a [`Clock`], applies
//! the stalled-frame timeout, and keeps running counters for the link.
//!
//! # Why is the clock a trait?
//!
//! The parser itself never reads the time; it is handed `now_ms` with every
//! byte.  Production code uses [`MonotonicClock`], while tests and simulations
//! use [`ManualClock`] and step time forward explicitly, so a 5-second timeout
//! can be exercised without sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::protocol::messages::{Direction, Frame, DEFAULT_FRAME_TIMEOUT_MS};
use crate::protocol::parser::{FrameParser, FrameRejection, ParseOutcome};

// ── Clock ─────────────────────────────────────────────────────────────────────

/// Source of monotonic milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Milliseconds since the clock was created, backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// A clock that only moves when told to.
///
/// Wrap it in an [`Arc`] to share one instance between a controller and the
/// code driving it.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_millis(&self) -> u64 {
        (**self).now_millis()
    }
}

// ── Link events and counters ──────────────────────────────────────────────────

/// Something the controller reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A complete, checksum-valid frame.
    Frame(Frame),
    /// A frame was abandoned because of a length violation or bad checksum.
    Rejected(FrameRejection),
    /// A frame was abandoned because it did not complete in time.
    Stalled { elapsed_ms: u64 },
}

/// Running counters for one link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub frames_accepted: u64,
    pub length_violations: u64,
    pub checksum_mismatches: u64,
    pub stalled: u64,
    /// Bytes dropped while hunting for a frame start.
    pub discarded_bytes: u64,
}

impl LinkStats {
    /// Frames that were started but never delivered, for any reason.
    pub fn frames_rejected(&self) -> u64 {
        self.length_violations + self.checksum_mismatches + self.stalled
    }
}

// ── SessionController ─────────────────────────────────────────────────────────

/// Feeds one link's bytes through a parser and applies the frame timeout.
#[derive(Debug)]
pub struct SessionController<C: Clock> {
    parser: FrameParser,
    clock: C,
    timeout_ms: u64,
    stats: LinkStats,
}

impl<C: Clock> SessionController<C> {
    pub fn new(direction: Direction, clock: C, timeout_ms: u64) -> Self {
        Self {
            parser: FrameParser::new(direction),
            clock,
            timeout_ms,
            stats: LinkStats::default(),
        }
    }

    /// Creates a controller using [`DEFAULT_FRAME_TIMEOUT_MS`].
    pub fn with_default_timeout(direction: Direction, clock: C) -> Self {
        Self::new(direction, clock, DEFAULT_FRAME_TIMEOUT_MS)
    }

    pub fn direction(&self) -> Direction {
        self.parser.direction()
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn parser(&self) -> &FrameParser {
        &self.parser
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Feeds a chunk of bytes and returns every event it produced, in order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        for &byte in bytes {
            self.feed_at(byte, self.clock.now_millis(), &mut events);
        }
        events
    }

    /// Feeds a single byte.
    ///
    /// If the previous frame had stalled, the stall is returned; the byte
    /// itself then either opens a new frame or is discarded, and neither of
    /// those produces an event.
    pub fn feed_byte(&mut self, byte: u8) -> Option<LinkEvent> {
        let mut events = Vec::with_capacity(1);
        self.feed_at(byte, self.clock.now_millis(), &mut events);
        match events.len() {
            0 => None,
            _ => Some(events.swap_remove(0)),
        }
    }

    /// Abandons the in-progress frame if it has exceeded the timeout.
    ///
    /// Call this periodically when no bytes are arriving.
    pub fn poll_timeout(&mut self) -> Option<LinkEvent> {
        let now = self.clock.now_millis();
        self.check_timeout(now)
    }

    /// Gives the in-progress frame a fresh timeout window.
    ///
    /// Called after the link deliberately stopped reading, so time spent
    /// paused does not count against a frame that was already arriving.
    pub fn restart_frame_timer(&mut self) {
        let now = self.clock.now_millis();
        self.parser.restart_timer(now);
    }

    /// Drops any in-progress frame without counting it.
    pub fn reset(&mut self) {
        self.parser.reset();
    }

    fn check_timeout(&mut self, now_ms: u64) -> Option<LinkEvent> {
        match self.parser.expire(now_ms, self.timeout_ms)? {
            FrameRejection::Timeout { elapsed_ms } => {
                self.stats.stalled += 1;
                warn!(elapsed_ms, timeout_ms = self.timeout_ms, "frame stalled; parser reset");
                Some(LinkEvent::Stalled { elapsed_ms })
            }
            other => Some(LinkEvent::Rejected(other)),
        }
    }

    fn feed_at(&mut self, byte: u8, now_ms: u64, events: &mut Vec<LinkEvent>) {
        if let Some(stalled) = self.check_timeout(now_ms) {
            events.push(stalled);
        }

        match self.parser.push(byte, now_ms) {
            ParseOutcome::Pending => {}
            ParseOutcome::Discarded(_) => self.stats.discarded_bytes += 1,
            ParseOutcome::Complete(frame) => {
                self.stats.frames_accepted += 1;
                debug!(
                    kind = frame.kind().as_byte(),
                    len = frame.payload().len(),
                    "frame accepted"
                );
                events.push(LinkEvent::Frame(frame));
            }
            ParseOutcome::Rejected(rejection) => {
                match rejection {
                    FrameRejection::LengthViolation { .. } => self.stats.length_violations += 1,
                    FrameRejection::ChecksumMismatch { .. } => self.stats.checksum_mismatches += 1,
                    FrameRejection::Timeout { .. } => self.stats.stalled += 1,
                }
                warn!(%rejection, "frame rejected");
                events.push(LinkEvent::Rejected(rejection));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::encode_raw;

    fn controller(start_ms: u64) -> (Arc<ManualClock>, SessionController<Arc<ManualClock>>) {
        let clock = Arc::new(ManualClock::new(start_ms));
        let ctrl = SessionController::new(Direction::HostToDevice, Arc::clone(&clock), 5_000);
        (clock, ctrl)
    }

    #[test]
    fn test_feed_delivers_complete_frame() {
        // Arrange
        let (_clock, mut ctrl) = controller(0);
        let bytes = encode_raw(0x20, &[], None).unwrap();

        // Act
        let events = ctrl.feed(&bytes);

        // Assert
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], LinkEvent::Frame(_)));
        assert_eq!(ctrl.stats().frames_accepted, 1);
    }

    #[test]
    fn test_feed_counts_discarded_noise() {
        let (_clock, mut ctrl) = controller(0);
        let events = ctrl.feed(&[0x00, 0xFF, 0x7E]);
        assert!(events.is_empty());
        assert_eq!(ctrl.stats().discarded_bytes, 3);
    }

    #[test]
    fn test_feed_reports_rejections_by_reason() {
        // Arrange: one oversized length, one bad checksum.
        let (_clock, mut ctrl) = controller(0);

        // Act
        let events = ctrl.feed(&[0x01, 0xFF, 0x01, 0x10, 0x00, 0x00, 0x00]);

        // Assert
        assert_eq!(
            events,
            vec![
                LinkEvent::Rejected(FrameRejection::LengthViolation { declared: 511 }),
                LinkEvent::Rejected(FrameRejection::ChecksumMismatch {
                    expected: 0x10,
                    received: 0x00
                }),
            ]
        );
        let stats = ctrl.stats();
        assert_eq!(stats.length_violations, 1);
        assert_eq!(stats.checksum_mismatches, 1);
        assert_eq!(stats.frames_rejected(), 2);
    }

    #[test]
    fn test_poll_timeout_abandons_stalled_frame() {
        // Arrange
        let (clock, mut ctrl) = controller(1_000);
        ctrl.feed(&[0x01, 0x04]);

        // Act
        clock.set(6_000);
        let in_time = ctrl.poll_timeout();
        clock.set(6_001);
        let stalled = ctrl.poll_timeout();

        // Assert
        assert_eq!(in_time, None);
        assert_eq!(stalled, Some(LinkEvent::Stalled { elapsed_ms: 5_001 }));
        assert!(!ctrl.parser().in_progress());
        assert_eq!(ctrl.stats().stalled, 1);
    }

    #[test]
    fn test_restarted_frame_timer_survives_a_long_pause() {
        // Arrange: a frame starts, then the link pauses for 8 s.
        let (clock, mut ctrl) = controller(1_000);
        let bytes = encode_raw(0x01, &[0x00, 0x64, 0x00, 0xC8], None).unwrap();
        ctrl.feed(&bytes[..2]);
        clock.advance(8_000);

        // Act
        ctrl.restart_frame_timer();
        let after_pause = ctrl.poll_timeout();
        let frames = ctrl.feed(&bytes[2..]);

        // Assert
        assert_eq!(after_pause, None);
        assert!(matches!(frames.as_slice(), [LinkEvent::Frame(_)]));
        assert_eq!(ctrl.stats().stalled, 0);
    }

    #[test]
    fn test_poll_timeout_without_frame_is_noop() {
        let (clock, mut ctrl) = controller(0);
        clock.advance(1_000_000);
        assert_eq!(ctrl.poll_timeout(), None);
    }

    #[test]
    fn test_stalled_frame_is_abandoned_before_next_byte() {
        // Arrange: half a frame, then a long pause, then a complete frame.
        let (clock, mut ctrl) = controller(0);
        ctrl.feed(&[0x04, 0x05, 0x00, b'h']);
        clock.advance(5_001);
        let good = encode_raw(0x10, &[], None).unwrap();

        // Act
        let events = ctrl.feed(&good);

        // Assert
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], LinkEvent::Stalled { elapsed_ms: 5_001 });
        assert!(matches!(events[1], LinkEvent::Frame(_)));
    }

    #[test]
    fn test_feed_byte_reports_stall_of_previous_frame() {
        let (clock, mut ctrl) = controller(0);
        ctrl.feed_byte(0x01);
        clock.advance(6_000);

        let event = ctrl.feed_byte(0x10);

        assert_eq!(event, Some(LinkEvent::Stalled { elapsed_ms: 6_000 }));
        assert!(ctrl.parser().in_progress(), "0x10 starts a new frame");
    }

    #[test]
    fn test_slow_but_in_time_frame_is_accepted() {
        let (clock, mut ctrl) = controller(0);
        for byte in encode_raw(0x06, &[0x00, 0xFA], None).unwrap() {
            clock.advance(900);
            ctrl.feed_byte(byte);
        }
        assert_eq!(ctrl.stats().frames_accepted, 1);
        assert_eq!(ctrl.stats().stalled, 0);
    }

    #[test]
    fn test_monotonic_clock_does_not_go_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.now_millis();
        let b = clock.now_millis();
        assert!(b >= a);
    }
}
