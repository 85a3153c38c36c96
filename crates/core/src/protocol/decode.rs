//! Permissive hex response decoding
//!
//! Terminals answer with hex text that may carry `0x` prefixes, separators or
//! garbage. Every two-digit token (optionally `0x`-prefixed) becomes one byte;
//! anything else is skipped without error.

/// Decoded text together with the number of characters that were skipped
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodeReport {
    pub text: String,
    pub skipped: usize,
}

/// Decoder for raw terminal responses
pub struct ResponseDecoder;

impl ResponseDecoder {
    /// Decode a raw response into display text (one character per byte)
    pub fn decode(raw: &str) -> String {
        Self::decode_with_report(raw).text
    }

    /// Decode a raw response into bytes
    pub fn decode_bytes(raw: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(raw.len() / 2);
        scan(raw.as_bytes(), |b| out.push(b), |_| {});
        out
    }

    /// Decode and count skipped input characters for diagnostics
    pub fn decode_with_report(raw: &str) -> DecodeReport {
        let mut text = String::with_capacity(raw.len() / 2);
        let mut skipped = 0;
        scan(
            raw.as_bytes(),
            |b| text.push(char::from(b)),
            |i| {
                // Count multi-byte characters once
                if raw.is_char_boundary(i) {
                    skipped += 1;
                }
            },
        );

        if skipped > 0 {
            tracing::debug!(skipped, "Skipped non-hex fragments in response");
        }

        DecodeReport { text, skipped }
    }
}

/// Scan left to right, emitting one byte per matched token and the index of
/// every skipped input byte.
fn scan(input: &[u8], mut emit: impl FnMut(u8), mut skip: impl FnMut(usize)) {
    let mut i = 0;

    while i < input.len() {
        if has_prefix(input, i) {
            if let Some(b) = pair_at(input, i + 2) {
                emit(b);
                i += 4;
                continue;
            }
        }
        if let Some(b) = pair_at(input, i) {
            emit(b);
            i += 2;
            continue;
        }
        skip(i);
        i += 1;
    }
}

fn has_prefix(input: &[u8], i: usize) -> bool {
    input.get(i) == Some(&b'0') && matches!(input.get(i + 1), Some(b'x') | Some(b'X'))
}

fn pair_at(input: &[u8], i: usize) -> Option<u8> {
    let hi = hex_value(*input.get(i)?)?;
    let lo = hex_value(*input.get(i + 1)?)?;
    Some(hi << 4 | lo)
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_hex() {
        assert_eq!(ResponseDecoder::decode("48656C6C6F"), "Hello");
        assert_eq!(ResponseDecoder::decode("48656c6c6f"), "Hello");
    }

    #[test]
    fn test_prefixed_tokens() {
        assert_eq!(ResponseDecoder::decode("0x480x650x6C0x6C0x6F"), "Hello");
        assert_eq!(ResponseDecoder::decode("0X480X69"), "Hi");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(ResponseDecoder::decode(""), "");
        assert_eq!(ResponseDecoder::decode_with_report(""), DecodeReport::default());
    }

    #[test]
    fn test_invalid_tokens_skipped() {
        assert_eq!(ResponseDecoder::decode("zz48"), "H");
        assert_eq!(ResponseDecoder::decode("48 69"), "Hi");
        assert_eq!(ResponseDecoder::decode("48:65:6C"), "Hel");
    }

    #[test]
    fn test_trailing_single_digit_ignored() {
        assert_eq!(ResponseDecoder::decode("4869A"), "Hi");
        assert_eq!(ResponseDecoder::decode("0x4"), "");
    }

    #[test]
    fn test_zero_pair_before_x() {
        // "00" is consumed as a byte, the "x" is skipped, then "41"
        assert_eq!(ResponseDecoder::decode("00x41"), "\u{0}A");
    }

    #[test]
    fn test_dangling_prefix() {
        assert_eq!(ResponseDecoder::decode("0x0x41"), "A");
    }

    #[test]
    fn test_high_bytes_map_to_latin1() {
        assert_eq!(ResponseDecoder::decode("F1"), "ñ");
        assert_eq!(ResponseDecoder::decode_bytes("F1"), vec![0xF1]);
    }

    #[test]
    fn test_control_bytes_preserved() {
        assert_eq!(ResponseDecoder::decode_bytes("0230030B"), vec![0x02, 0x30, 0x03, 0x0B]);
    }

    #[test]
    fn test_report_counts_skipped() {
        let report = ResponseDecoder::decode_with_report("zz48-65");
        assert_eq!(report.text, "He");
        assert_eq!(report.skipped, 3);
    }

    #[test]
    fn test_report_counts_multibyte_once() {
        let report = ResponseDecoder::decode_with_report("é48");
        assert_eq!(report.text, "H");
        assert_eq!(report.skipped, 1);
    }
}
