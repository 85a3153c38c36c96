//! Decoded terminal responses

use serde::{Deserialize, Serialize};

use crate::protocol::{Frame, ResponseDecoder, ETX, FIELD_SEPARATOR, STX};

/// A decoded response from the terminal
///
/// `text` is always the full decoded string. When the decoded bytes carry a
/// valid `STX .. ETX LRC` frame, `fields` come from the frame body and
/// `checksum_ok` is `Some(true)`; a frame with a bad checksum gives
/// `Some(false)` and fields from the unverified body; unframed text gives `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalResponse {
    pub raw: String,
    pub text: String,
    pub fields: Vec<String>,
    pub checksum_ok: Option<bool>,
}

impl TerminalResponse {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let text = ResponseDecoder::decode(&raw);
        let bytes = ResponseDecoder::decode_bytes(&raw);

        let (fields_source, checksum_ok) = match Frame::parse(&bytes) {
            Ok(frame) => (frame.body_text(), Some(true)),
            Err(err) => match unverified_body(&bytes) {
                Some(body) => {
                    tracing::warn!(error = %err, "Response frame rejected, using unverified body");
                    (body, Some(false))
                }
                None => (text.clone(), None),
            },
        };

        let fields = fields_source
            .split(FIELD_SEPARATOR)
            .map(str::to_string)
            .collect();

        Self {
            raw,
            text,
            fields,
            checksum_ok,
        }
    }

    /// Response opcode, the first field
    pub fn opcode(&self) -> Option<&str> {
        self.fields.first().map(String::as_str).filter(|s| !s.is_empty())
    }

    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }
}

/// Body of a frame that failed validation: after STX, up to ETX or the end
fn unverified_body(bytes: &[u8]) -> Option<String> {
    let start = bytes.iter().position(|&b| b == STX)? + 1;
    let end = bytes[start..]
        .iter()
        .position(|&b| b == ETX)
        .map_or(bytes.len(), |offset| start + offset);
    Some(bytes[start..end].iter().map(|&b| char::from(b)).collect())
}
