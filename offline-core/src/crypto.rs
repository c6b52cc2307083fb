//! Cryptographic primitives (§4.1, C1).
//!
//! Everything here is a thin wrapper over `ring`: HMAC-SHA256 for signing,
//! SHA-256 for content hashes, and the OS CSPRNG for key material and
//! identifiers. No primitive is implemented from scratch.

use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{OfflineCoreError, Result};

/// Domain-separation salt mixed into every canonical signing string (§4.4).
/// Prevents a signature minted for one protocol version from verifying
/// under a future, differently-shaped encoding.
pub const SIGNING_DOMAIN_SALT: &str = "festivals_offline_v1";

/// Computes HMAC-SHA256 over `message` keyed by `key`, returning the raw
/// 32-byte tag.
pub fn hmac_sha256(key: &[u8; 32], message: &str) -> [u8; 32] {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    let tag = hmac::sign(&key, message.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(tag.as_ref());
    out
}

/// Verifies an HMAC-SHA256 tag in constant time. `tag_hex` must be a
/// lowercase 64-character hex string; any other shape is treated as a
/// verification failure rather than a parse error, since an attacker who
/// can distinguish "malformed" from "wrong" learns information about the
/// check.
pub fn hmac_sha256_verify(key: &[u8; 32], message: &str, tag_hex: &str) -> bool {
    let Ok(expected) = offline_wire::hex::decode(tag_hex) else {
        return false;
    };
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    hmac::verify(&key, message.as_bytes(), &expected).is_ok()
}

/// SHA-256 over arbitrary bytes, returned as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = ring::digest::digest(&ring::digest::SHA256, data);
    offline_wire::hex::encode(digest.as_ref())
}

/// Fills `out` with cryptographically secure random bytes.
pub fn fill_random(out: &mut [u8]) -> Result<()> {
    SystemRandom::new()
        .fill(out)
        .map_err(|_| OfflineCoreError::CryptoUnavailable("CSPRNG unavailable".into()))
}

/// Generates 32 bytes of random key material, suitable for a
/// `DeviceSecret` or `SigningKey`.
pub fn random_key() -> Result<[u8; 32]> {
    let mut out = [0u8; 32];
    fill_random(&mut out)?;
    Ok(out)
}

/// Generates a random version-4 UUID, formatted per RFC 4122
/// (`xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx`).
///
/// No `uuid` crate dependency: this is 16 random bytes with two nibbles
/// forced to the version/variant bits, which is the entire algorithm.
pub fn uuid_v4() -> Result<String> {
    let mut bytes = [0u8; 16];
    fill_random(&mut bytes)?;
    bytes[6] = (bytes[6] & 0x0f) | 0x40; // version 4
    bytes[8] = (bytes[8] & 0x3f) | 0x80; // variant 10xx

    let hex = offline_wire::hex::encode(&bytes);
    Ok(format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    ))
}

const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Renders `n` in base 36, lowercase, no leading zeros (`0` itself renders
/// as `"0"`). Used by the idempotency-key format `offline_<base36-ts>_<..>`.
pub fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_owned();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36_ALPHABET[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).expect("base36 alphabet is ASCII")
}
