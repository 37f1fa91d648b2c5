//! Protocol module containing frame types, the checksum, the encoder, and the
//! streaming parser.

pub mod checksum;
pub mod codec;
pub mod messages;
pub mod parser;

pub use checksum::{checksum, verify_checksum};
pub use codec::{decode_command, decode_event, encode_command, encode_event, encode_frame, encode_raw};
pub use messages::*;
pub use parser::{FrameParser, FrameRejection, ParseOutcome, ParserState};
