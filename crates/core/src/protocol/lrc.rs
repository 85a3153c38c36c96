//! Longitudinal redundancy check

/// Compute the LRC of a frame prefix.
///
/// XORs every byte after the leading STX through the last byte (ETX included).
/// Inputs of one byte or less yield 0.
pub fn compute_lrc(frame: &[u8]) -> u8 {
    frame.iter().skip(1).fold(0u8, |acc, &b| acc ^ b)
}

/// Check a complete frame (`STX .. ETX LRC`).
///
/// XOR over everything after STX, checksum included, folds to zero.
pub fn verify_frame_lrc(frame: &[u8]) -> bool {
    frame.len() >= 3 && compute_lrc(frame) == 0
}
