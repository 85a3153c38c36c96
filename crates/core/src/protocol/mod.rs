//! Terminal wire protocol: framing, checksum and response decoding

mod codec;
mod decode;
mod lrc;

pub use codec::{Frame, FrameCodec};
pub use decode::{DecodeReport, ResponseDecoder};
pub use lrc::{compute_lrc, verify_frame_lrc};

/// Start-of-text marker
pub const STX: u8 = 0x02;
/// End-of-text marker
pub const ETX: u8 = 0x03;
/// Separator between command fields
pub const FIELD_SEPARATOR: char = '|';
