//! Parses and verifies QR payloads: expiration + signature checks
//! (§4.10, C10).

use offline_wire::money::MinorUnits;
use offline_wire::qr::QrPayload;
use offline_wire::TimestampMillis;
use secrecy::{ExposeSecret, Secret};
use tracing::info;

use crate::crypto;
use crate::duplicate_guard::DuplicateGuard;
use crate::error::{OfflineCoreError, Result};
use crate::signer;
use crate::storage::Storage;
use crate::wallet_cache::WalletCache;

/// Fallback salt used to derive a verification challenge when no
/// `QRVerificationKey` is provisioned (§4.10).
pub const OFFLINE_FALLBACK_KEY: &str = "offline_fallback";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrValidationResult {
    pub wallet_id: String,
    pub user_id: String,
    pub balance: MinorUnits,
    /// `None` when `QRVerificationKey` was absent (§4.10's `Unverified` path).
    pub warning: Option<Warning>,
    /// Tamper-evident token to display to the customer (§4.10).
    pub verification_challenge: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    Unverified,
}

pub struct QrValidator;

impl QrValidator {
    /// Parses and validates a raw QR JSON payload.
    ///
    /// `transaction_id` is the scan-linked duplicate-detection context
    /// (§4.10): `DuplicateGuard` is consulted only when the caller supplies
    /// one.
    pub fn validate<WS: Storage, DS: Storage>(
        raw_json: &str,
        qr_verification_key: Option<&Secret<[u8; 32]>>,
        wallet_cache: &WalletCache<WS>,
        duplicate_guard: Option<(&DuplicateGuard<DS>, &str)>,
        now: TimestampMillis,
    ) -> Result<QrValidationResult> {
        let payload: QrPayload = serde_json::from_str(raw_json)
            .map_err(|e| OfflineCoreError::MalformedQr(e.to_string()))?;

        if payload.expires_at.as_i64() <= now.as_i64() {
            return Err(OfflineCoreError::QrExpired);
        }

        if let Some((guard, transaction_id)) = duplicate_guard {
            if guard.contains(transaction_id, now) {
                return Err(OfflineCoreError::DuplicateTransaction(transaction_id.to_owned()));
            }
        }

        let warning = match qr_verification_key {
            Some(key) => {
                let verifies = signer::verify_qr(
                    &payload.wallet_id,
                    &payload.user_id,
                    payload.balance,
                    payload.expires_at,
                    &payload.signature,
                    key,
                );
                if !verifies {
                    return Err(OfflineCoreError::QrSignatureInvalid);
                }
                None
            }
            None => Some(Warning::Unverified),
        };

        wallet_cache.put(wallet_from_payload(&payload, now))?;

        let challenge_key = qr_verification_key
            .map(|k| *k.expose_secret())
            .unwrap_or_else(challenge_fallback_key);
        let challenge_message =
            format!("{}|{}|{}", payload.wallet_id, payload.balance.to_fixed_two(), now.as_i64());
        let challenge_tag = crypto::hmac_sha256(&challenge_key, &challenge_message);
        let verification_challenge =
            offline_wire::hex::encode(&challenge_tag)[..8].to_uppercase();

        info!(wallet_id = %payload.wallet_id, "qr_validator: accepted payload");

        Ok(QrValidationResult {
            wallet_id: payload.wallet_id,
            user_id: payload.user_id,
            balance: payload.balance,
            warning,
            verification_challenge,
        })
    }
}

fn wallet_from_payload(payload: &QrPayload, now: TimestampMillis) -> crate::types::CachedWallet {
    crate::types::CachedWallet {
        wallet_id: payload.wallet_id.clone(),
        user_id: payload.user_id.clone(),
        customer_name: payload.name.clone(),
        balance: payload.balance,
        last_synced_at: now,
        last_used_at: None,
    }
}

fn challenge_fallback_key() -> [u8; 32] {
    let digest = crypto::sha256_hex(OFFLINE_FALLBACK_KEY.as_bytes());
    let mut out = [0u8; 32];
    offline_wire::hex::decode_to_slice(&digest, &mut out).expect("sha256 hex is always 64 chars");
    out
}

#[cfg(test)]
mod test {
    use secrecy::Secret;

    use super::*;
    use crate::signer;
    use crate::storage::MemStorage;

    fn payload_json(wallet_id: &str, balance: u64, expires_at: i64, signature: &str) -> String {
        format!(
            r#"{{"walletId":"{wallet_id}","userId":"U1","balance":{balance},"expiresAt":{expires_at},"signature":"{signature}"}}"#
        )
    }

    #[test]
    fn s4_expired_is_rejected_regardless_of_signature() {
        let cache: WalletCache<MemStorage> = WalletCache::load(MemStorage::new()).unwrap();
        let now = TimestampMillis::from_millis(1_000);
        let json = payload_json("W1", 100_000, 999, "deadbeef");
        let err = QrValidator::validate::<MemStorage, MemStorage>(&json, None, &cache, None, now)
            .unwrap_err();
        assert!(matches!(err, OfflineCoreError::QrExpired));
    }

    #[test]
    fn s3_forged_signature_is_rejected_with_no_cache_mutation() {
        let cache: WalletCache<MemStorage> = WalletCache::load(MemStorage::new()).unwrap();
        let now = TimestampMillis::from_millis(0);
        let expires_at = TimestampMillis::from_millis(10_000);
        let correct_key = Secret::new([1u8; 32]);
        let wrong_key = Secret::new([2u8; 32]);
        let sig = signer::sign_qr("W1", "U1", MinorUnits::new(100_000), expires_at, &wrong_key);
        let json = payload_json("W1", 100_000, 10_000, &sig);

        let err = QrValidator::validate::<MemStorage, MemStorage>(
            &json,
            Some(&correct_key),
            &cache,
            None,
            now,
        )
        .unwrap_err();
        assert!(matches!(err, OfflineCoreError::QrSignatureInvalid));
        assert!(cache.get("W1").is_none());
    }

    #[test]
    fn valid_signature_is_accepted_and_caches_wallet() {
        let cache: WalletCache<MemStorage> = WalletCache::load(MemStorage::new()).unwrap();
        let now = TimestampMillis::from_millis(0);
        let expires_at = TimestampMillis::from_millis(10_000);
        let key = Secret::new([1u8; 32]);
        let sig = signer::sign_qr("W1", "U1", MinorUnits::new(100_000), expires_at, &key);
        let json = payload_json("W1", 100_000, 10_000, &sig);

        let result =
            QrValidator::validate::<MemStorage, MemStorage>(&json, Some(&key), &cache, None, now)
                .unwrap();
        assert!(result.warning.is_none());
        assert_eq!(result.verification_challenge.len(), 8);
        assert!(cache.get("W1").is_some());
    }

    #[test]
    fn missing_verification_key_is_unverified_but_accepted() {
        let cache: WalletCache<MemStorage> = WalletCache::load(MemStorage::new()).unwrap();
        let now = TimestampMillis::from_millis(0);
        let json = payload_json("W1", 100_000, 10_000, "deadbeef");

        let result =
            QrValidator::validate::<MemStorage, MemStorage>(&json, None, &cache, None, now).unwrap();
        assert_eq!(result.warning, Some(Warning::Unverified));
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let cache: WalletCache<MemStorage> = WalletCache::load(MemStorage::new()).unwrap();
        let now = TimestampMillis::from_millis(0);
        let json = r#"{"walletId":"W1","userId":"U1","balance":100,"signature":"deadbeef"}"#;
        let err = QrValidator::validate::<MemStorage, MemStorage>(json, None, &cache, None, now)
            .unwrap_err();
        assert!(matches!(err, OfflineCoreError::MalformedQr(_)));
    }
}
