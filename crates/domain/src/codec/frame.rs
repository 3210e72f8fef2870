//! 20-byte device code frames.
//!
//! A frame is up to 19 value bytes, zero-padded, followed by an XOR checksum
//! of the preceding bytes. Frames travel as raw bytes over the radio and as
//! base64 strings over the cloud.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::CommandError;

/// Total length of a device code frame.
pub const FRAME_LEN: usize = 20;

/// First byte of a command frame.
pub const COMMAND_PREFIX: u8 = 0x33;

/// First byte of a status (query response) frame.
pub const QUERY_PREFIX: u8 = 0xAA;

/// XOR of every byte.
#[must_use]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Build a frame from leading value bytes.
///
/// Values beyond the 19th byte are dropped.
#[must_use]
pub fn build(values: &[u8]) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    let len = values.len().min(FRAME_LEN - 1);
    frame[..len].copy_from_slice(&values[..len]);
    frame[FRAME_LEN - 1] = checksum(&frame[..FRAME_LEN - 1]);
    frame
}

/// Build a frame and encode it as base64.
#[must_use]
pub fn encode_code(values: &[u8]) -> String {
    STANDARD.encode(build(values))
}

/// Decode a base64 code into bytes.
///
/// # Errors
///
/// Returns [`CommandError::InvalidCode`] when the input is not base64.
pub fn decode_code(code: &str) -> Result<Vec<u8>, CommandError> {
    STANDARD
        .decode(code.trim())
        .map_err(|_| CommandError::InvalidCode)
}

/// Lowercase hex rendering used in logs.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Whether the last byte is the XOR of the others.
#[must_use]
pub fn has_valid_checksum(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((last, body)) => checksum(body) == *last,
        None => false,
    }
}
