//! STX/ETX framing and hex payload encoding

use std::fmt::Write as _;

use crate::error::{FramingError, Result};
use crate::protocol::lrc::{compute_lrc, verify_frame_lrc};
use crate::protocol::{ETX, STX};

/// A framed command: `STX + body + ETX + LRC`
///
/// Always `body.len() + 3` bytes. Body bytes are the scalar values of the
/// command characters, so only characters up to U+00FF can be framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    /// Frame a command body
    ///
    /// # Errors
    /// `FramingError::NonByteCharacter` if any character is above U+00FF.
    pub fn new(command: &str) -> Result<Self> {
        let mut bytes = Vec::with_capacity(command.len() + 3);
        bytes.push(STX);
        for (position, ch) in command.chars().enumerate() {
            let scalar = ch as u32;
            let byte = u8::try_from(scalar).map_err(|_| FramingError::NonByteCharacter {
                ch,
                scalar,
                position,
            })?;
            bytes.push(byte);
        }
        bytes.push(ETX);

        let lrc = compute_lrc(&bytes);
        bytes.push(lrc);

        Ok(Self { bytes })
    }

    /// Parse a frame out of decoded response bytes
    ///
    /// Leading noise before STX is ignored. The byte following the first ETX
    /// is taken as the checksum and must match.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let start = raw
            .iter()
            .position(|&b| b == STX)
            .ok_or(FramingError::MissingMarker("STX"))?;
        let end = raw[start..]
            .iter()
            .position(|&b| b == ETX)
            .map(|offset| start + offset)
            .ok_or(FramingError::MissingMarker("ETX"))?;
        let got = *raw.get(end + 1).ok_or(FramingError::MissingChecksum)?;

        let bytes = raw[start..=end + 1].to_vec();
        if !verify_frame_lrc(&bytes) {
            let expected = compute_lrc(&bytes[..bytes.len() - 1]);
            return Err(FramingError::ChecksumMismatch { expected, got }.into());
        }

        Ok(Self { bytes })
    }

    /// Full frame bytes, checksum included
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes between STX and ETX
    pub fn body(&self) -> &[u8] {
        &self.bytes[1..self.bytes.len() - 2]
    }

    /// Body as text, one character per byte
    pub fn body_text(&self) -> String {
        self.body().iter().map(|&b| char::from(b)).collect()
    }

    /// Trailing checksum byte
    pub fn lrc(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    /// Uppercase hex, two digits per byte, no separators
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(self.bytes.len() * 2);
        for b in &self.bytes {
            // Writing into a String cannot fail
            let _ = write!(out, "{:02X}", b);
        }
        out
    }
}

/// Encoder for outbound terminal payloads
pub struct FrameCodec;

impl FrameCodec {
    /// Frame a command body and render it as a hex payload
    ///
    /// Output length is always `2 * (command.chars().count() + 3)`.
    pub fn encode(command: &str) -> Result<String> {
        let frame = Frame::new(command)?;
        let payload = frame.to_hex();
        tracing::debug!(command, payload = %payload, lrc = frame.lrc(), "Encoded frame");
        Ok(payload)
    }
}
