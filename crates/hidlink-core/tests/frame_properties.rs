//! Property tests for the frame encoder, parser, checksum, and key tables.
//!
//! Each property drives the public API only: frames are produced with
//! `encode_raw` and consumed one byte at a time by `FrameParser`.

use hidlink_core::{
    checksum, encode_raw, verify_checksum, CommandKind, Direction, EventKind, FrameParser,
    FrameRejection, KeyTranslator, ParseOutcome, ParserState, MAX_PAYLOAD, UNSUPPORTED,
};
use proptest::prelude::*;

fn command_kind() -> impl Strategy<Value = CommandKind> {
    prop::sample::select(CommandKind::ALL.to_vec())
}

fn event_kind() -> impl Strategy<Value = EventKind> {
    prop::sample::select(EventKind::ALL.to_vec())
}

fn payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD)
}

fn parse_all(parser: &mut FrameParser, bytes: &[u8]) -> Vec<ParseOutcome> {
    bytes.iter().map(|&b| parser.push(b, 0)).collect()
}

/// Scan codes the device supports, in decimal.
fn is_supported_scan_code(scan: u8) -> bool {
    matches!(scan, 4..=29 | 30..=39 | 40..=44 | 58..=69 | 82..=85)
}

proptest! {
    /// A well-formed command frame fed byte-by-byte yields exactly one frame
    /// equal to what was encoded.
    #[test]
    fn prop_command_frame_parses_back(kind in command_kind(), payload in payload()) {
        let bytes = encode_raw(kind as u8, &payload, None).unwrap();
        let mut parser = FrameParser::new(Direction::HostToDevice);

        let outcomes = parse_all(&mut parser, &bytes);

        let (last, rest) = outcomes.split_last().unwrap();
        prop_assert!(rest.iter().all(|o| *o == ParseOutcome::Pending));
        match last {
            ParseOutcome::Complete(frame) => {
                prop_assert_eq!(frame.kind().as_byte(), kind as u8);
                prop_assert_eq!(frame.payload(), payload.as_slice());
                prop_assert_eq!(frame.timestamp(), None);
            }
            other => prop_assert!(false, "expected a complete frame, got {:?}", other),
        }
        prop_assert_eq!(parser.state(), ParserState::Idle);
    }

    /// Same for event frames, which also carry a timestamp.
    #[test]
    fn prop_event_frame_parses_back(kind in event_kind(), payload in payload(), ts in any::<u32>()) {
        let bytes = encode_raw(kind as u8, &payload, Some(ts)).unwrap();
        let mut parser = FrameParser::new(Direction::DeviceToHost);

        let outcomes = parse_all(&mut parser, &bytes);

        match outcomes.last() {
            Some(ParseOutcome::Complete(frame)) => {
                prop_assert_eq!(frame.kind().as_byte(), kind as u8);
                prop_assert_eq!(frame.payload(), payload.as_slice());
                prop_assert_eq!(frame.timestamp(), Some(ts));
            }
            other => prop_assert!(false, "expected a complete frame, got {:?}", other),
        }
    }

    /// The trailing byte is the XOR of everything before it.
    #[test]
    fn prop_checksum_covers_every_preceding_byte(
        kind in command_kind(),
        payload in payload(),
        ts in proptest::option::of(any::<u32>()),
    ) {
        let bytes = encode_raw(kind as u8, &payload, ts).unwrap();
        let (&trailer, body) = bytes.split_last().unwrap();

        prop_assert_eq!(trailer, checksum(body));
        prop_assert!(verify_checksum(&bytes));
    }

    /// Any declared length above the maximum is rejected on the third byte.
    #[test]
    fn prop_oversized_length_is_rejected(
        kind in command_kind(),
        declared in (MAX_PAYLOAD as u16 + 1)..=u16::MAX,
    ) {
        let mut parser = FrameParser::new(Direction::HostToDevice);
        let [lo, hi] = declared.to_le_bytes();

        let outcomes = parse_all(&mut parser, &[kind as u8, lo, hi]);

        prop_assert_eq!(
            &outcomes[2],
            &ParseOutcome::Rejected(FrameRejection::LengthViolation { declared })
        );
        prop_assert_eq!(parser.state(), ParserState::Idle);
    }

    /// Flipping one bit after the header turns a good frame into a rejected one.
    #[test]
    fn prop_single_bit_flip_is_rejected(
        kind in event_kind(),
        payload in payload(),
        ts in any::<u32>(),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut bytes = encode_raw(kind as u8, &payload, Some(ts)).unwrap();
        let index = 3 + position.index(bytes.len() - 3);
        bytes[index] ^= 1 << bit;
        let mut parser = FrameParser::new(Direction::DeviceToHost);

        let outcomes = parse_all(&mut parser, &bytes);

        prop_assert!(!outcomes.iter().any(|o| matches!(o, ParseOutcome::Complete(_))));
        let rejected = matches!(
            outcomes.last(),
            Some(ParseOutcome::Rejected(FrameRejection::ChecksumMismatch { .. }))
        );
        prop_assert!(rejected);
    }

    /// Flipping a bit in the kind byte never yields a frame: a still-valid
    /// kind fails the checksum, an invalid one leaves too few bytes behind.
    #[test]
    fn prop_kind_byte_flip_is_never_completed(
        kind in event_kind(),
        ts in any::<u32>(),
        bit in 0u8..8,
    ) {
        let mut bytes = encode_raw(kind as u8, &[], Some(ts)).unwrap();
        bytes[0] ^= 1 << bit;
        let mut parser = FrameParser::new(Direction::DeviceToHost);

        let outcomes = parse_all(&mut parser, &bytes);

        prop_assert!(!outcomes.iter().any(|o| matches!(o, ParseOutcome::Complete(_))));
        if EventKind::try_from(bytes[0]).is_ok() {
            let rejected = matches!(
                outcomes.last(),
                Some(ParseOutcome::Rejected(FrameRejection::ChecksumMismatch { .. }))
            );
            prop_assert!(rejected);
        } else {
            prop_assert_eq!(&outcomes[0], &ParseOutcome::Discarded(bytes[0]));
        }
    }

    #[test]
    fn prop_command_kind_flip_is_never_completed(kind in command_kind(), bit in 0u8..8) {
        let mut bytes = encode_raw(kind as u8, &[], None).unwrap();
        bytes[0] ^= 1 << bit;
        let mut parser = FrameParser::new(Direction::HostToDevice);

        let outcomes = parse_all(&mut parser, &bytes);

        prop_assert!(!outcomes.iter().any(|o| matches!(o, ParseOutcome::Complete(_))));
    }

    /// Garbage that contains no valid kind byte never disturbs the next frame.
    #[test]
    fn prop_noise_before_frame_is_skipped(
        noise in prop::collection::vec(
            any::<u8>().prop_filter("not a command kind", |b| CommandKind::try_from(*b).is_err()),
            0..64,
        ),
        kind in command_kind(),
        payload in payload(),
    ) {
        let mut stream = noise.clone();
        stream.extend(encode_raw(kind as u8, &payload, None).unwrap());
        let mut parser = FrameParser::new(Direction::HostToDevice);

        let outcomes = parse_all(&mut parser, &stream);

        let discarded = outcomes.iter().filter(|o| matches!(o, ParseOutcome::Discarded(_))).count();
        let complete = outcomes.iter().filter(|o| matches!(o, ParseOutcome::Complete(_))).count();
        prop_assert_eq!(discarded, noise.len());
        prop_assert_eq!(complete, 1);
    }
}

#[test]
fn test_scan_code_translation_is_total() {
    for scan in 0..=u8::MAX {
        let virtual_key = KeyTranslator::scan_to_virtual(scan);
        if is_supported_scan_code(scan) {
            assert_ne!(virtual_key, UNSUPPORTED, "scan code {scan} must be supported");
            assert_ne!(KeyTranslator::scan_to_native(scan), 0, "scan code {scan} must reach a native key");
        } else {
            assert_eq!(virtual_key, UNSUPPORTED, "scan code {scan} must be unsupported");
        }
    }
}
