//! Collision-resistant offline receipt IDs (§4.3, C3).

use offline_wire::TimestampMillis;

use crate::crypto;
use crate::error::Result;

/// Generates `"OFF-AAAA-BBBB"` where `AAAABBBB` are the first 8 upper-case
/// hex characters of `sha256(deviceSecret | "|" | nowMs | "|" | short-random)`.
///
/// Collisions are accepted at the 2^32 birthday bound per device; the
/// server deduplicates by `idempotencyKey`, never by `receiptId`.
pub fn generate_receipt_id(device_secret: &[u8; 32], now: TimestampMillis) -> Result<String> {
    let mut rand_bytes = [0u8; 4];
    crypto::fill_random(&mut rand_bytes)?;
    let short_random = offline_wire::hex::encode(&rand_bytes);

    let mut message = Vec::with_capacity(32 + 1 + 20 + 1 + short_random.len());
    message.extend_from_slice(device_secret);
    message.push(b'|');
    message.extend_from_slice(now.as_i64().to_string().as_bytes());
    message.push(b'|');
    message.extend_from_slice(short_random.as_bytes());

    let digest = crypto::sha256_hex(&message).to_uppercase();
    Ok(format!("OFF-{}-{}", &digest[0..4], &digest[4..8]))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn matches_expected_shape() {
        let id = generate_receipt_id(&[1u8; 32], TimestampMillis::from_millis(1_700_000_000_000))
            .unwrap();
        assert_eq!(id.len(), "OFF-AAAA-BBBB".len());
        assert!(id.starts_with("OFF-"));
        let parts: Vec<&str> = id.trim_start_matches("OFF-").split('-').collect();
        assert_eq!(parts.len(), 2);
        for part in parts {
            assert_eq!(part.len(), 4);
            assert!(part.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn two_calls_differ() {
        let now = TimestampMillis::from_millis(1_700_000_000_000);
        let a = generate_receipt_id(&[1u8; 32], now).unwrap();
        let b = generate_receipt_id(&[1u8; 32], now).unwrap();
        // random component makes collision astronomically unlikely
        assert_ne!(a, b);
    }
}
