//! Utilities for encoding and decoding hex-formatted data.
//!
//! Pulled out as its own tiny module (rather than reaching for the `hex`
//! crate) so the wire format's error type (`DecodeError`) can carry exactly
//! the two cases we distinguish on: odd-length input and non-hex characters.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error, Serialize, Deserialize)]
pub enum DecodeError {
    #[error("hex decode error: output buffer length != half input length")]
    BadOutputLength,
    #[error("hex decode error: input contains a non-hex character")]
    InvalidCharacter,
    #[error("hex decode error: input string length must be even")]
    OddInputLength,
}

/// Encode a byte slice as a lowercase hex string.
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(encode_nibble(byte >> 4));
        out.push(encode_nibble(byte & 0x0f));
    }
    out
}

/// Decode a hex string to owned bytes.
pub fn decode(hex: &str) -> Result<Vec<u8>, DecodeError> {
    let chunks = hex_str_to_chunks(hex)?;
    let mut out = vec![0u8; chunks.len()];
    decode_into(chunks, &mut out)?;
    Ok(out)
}

/// Decode a hex string into a fixed-size output buffer.
pub fn decode_to_slice(hex: &str, out: &mut [u8]) -> Result<(), DecodeError> {
    let chunks = hex_str_to_chunks(hex)?;
    decode_into(chunks, out)
}

fn hex_str_to_chunks(hex: &str) -> Result<&[u8], DecodeError> {
    let bytes = hex.as_bytes();
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::OddInputLength);
    }
    Ok(bytes)
}

fn decode_into(hex_bytes: &[u8], out: &mut [u8]) -> Result<(), DecodeError> {
    if out.len() * 2 != hex_bytes.len() {
        return Err(DecodeError::BadOutputLength);
    }
    for (chunk, out_byte) in hex_bytes.chunks_exact(2).zip(out.iter_mut()) {
        let hi = decode_nibble(chunk[0])?;
        let lo = decode_nibble(chunk[1])?;
        *out_byte = (hi << 4) | lo;
    }
    Ok(())
}

const fn encode_nibble(nibble: u8) -> char {
    match nibble {
        0..=9 => (b'0' + nibble) as char,
        10..=15 => (b'a' + (nibble - 10)) as char,
        _ => unreachable!(),
    }
}

fn decode_nibble(c: u8) -> Result<u8, DecodeError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(DecodeError::InvalidCharacter),
    }
}

/// A `Display`/`Debug` impl for a byte slice that renders as hex without
/// allocating up front.
pub struct HexDisplay<'a>(pub &'a [u8]);

pub fn display(bytes: &[u8]) -> HexDisplay<'_> {
    HexDisplay(bytes)
}

impl fmt::Display for HexDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for HexDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn known_vectors() {
        assert_eq!(encode(&[]), "");
        assert_eq!(encode(&[0x00]), "00");
        assert_eq!(encode(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
        assert_eq!(decode("deadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn rejects_odd_length() {
        assert_eq!(decode("abc").unwrap_err(), DecodeError::OddInputLength);
    }

    #[test]
    fn rejects_non_hex() {
        assert_eq!(decode("zz").unwrap_err(), DecodeError::InvalidCharacter);
    }

    proptest! {
        #[test]
        fn round_trips(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let encoded = encode(&bytes);
            let decoded = decode(&encoded).unwrap();
            prop_assert_eq!(bytes, decoded);
        }
    }
}
