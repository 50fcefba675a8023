/// Conversion between byte buffers and upper-case hex text
use ::hex::FromHexError;

use crate::error::DecodeError;

/// Encode bytes as upper-case hex, two digits per byte
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    ::hex::encode_upper(bytes)
}

/// Parse hex text into bytes
///
/// Accepts either case. An odd number of digits or any non-hex character
/// is rejected; a trailing nibble is never silently dropped. Empty input
/// yields an empty buffer.
pub fn hex_to_bytes(text: &str) -> Result<Vec<u8>, DecodeError> {
    ::hex::decode(text).map_err(|e| match e {
        FromHexError::InvalidHexCharacter { c, index } => DecodeError::InvalidDigit {
            digit: c,
            position: index,
        },
        FromHexError::OddLength | FromHexError::InvalidStringLength => {
            DecodeError::OddLength(text.len())
        }
    })
}
