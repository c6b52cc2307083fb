//! Canonical encoding, signing, and verification of payment intents (§4.4, C4).

use offline_wire::money::MinorUnits;
use offline_wire::TimestampMillis;
use secrecy::{ExposeSecret, Secret};

use crate::crypto::{self, SIGNING_DOMAIN_SALT};
use crate::types::OfflineTransaction;

/// Canonical pipe-joined encoding for an [`OfflineTransaction`] (§4.4):
///
/// `id | type | amount.toFixedTwo | walletId | userId | (standId|"") | idempotencyKey | timestamp | SALT`
pub fn canonical_transaction_string(txn: &OfflineTransaction) -> String {
    format!(
        "{id}|{ty}|{amount}|{wallet_id}|{user_id}|{stand_id}|{idempotency_key}|{timestamp}|{salt}",
        id = txn.id,
        ty = txn.ty.as_wire_str(),
        amount = txn.amount.to_fixed_two(),
        wallet_id = txn.wallet_id,
        user_id = txn.user_id,
        stand_id = txn.stand_id,
        idempotency_key = txn.idempotency_key,
        timestamp = txn.timestamp.as_i64(),
        salt = SIGNING_DOMAIN_SALT,
    )
}

/// Canonical pipe-joined encoding for a QR payload, per C10's use of §4.4:
/// `walletId | userId | balance.toFixedTwo | expiresAt`.
pub fn canonical_qr_string(
    wallet_id: &str,
    user_id: &str,
    balance: MinorUnits,
    expires_at: TimestampMillis,
) -> String {
    format!(
        "{wallet_id}|{user_id}|{balance}|{expires_at}",
        balance = balance.to_fixed_two(),
        expires_at = expires_at.as_i64(),
    )
}

/// Signs `txn` under `key` (the key precedence — `SigningKey` else
/// `DeviceSecret` — is resolved by the caller via `SecureKeyStore`) and
/// returns the hex-encoded tag.
pub fn sign_transaction(txn: &OfflineTransaction, key: &Secret<[u8; 32]>) -> String {
    let message = canonical_transaction_string(txn);
    let tag = crypto::hmac_sha256(key.expose_secret(), &message);
    offline_wire::hex::encode(&tag)
}

/// Recomputes the canonical string and compares the tag in constant time.
pub fn verify_transaction(txn: &OfflineTransaction, key: &Secret<[u8; 32]>) -> bool {
    let message = canonical_transaction_string(txn);
    crypto::hmac_sha256_verify(key.expose_secret(), &message, &txn.signature)
}

/// Signs a QR canonical string under `QRVerificationKey`.
pub fn sign_qr(
    wallet_id: &str,
    user_id: &str,
    balance: MinorUnits,
    expires_at: TimestampMillis,
    key: &Secret<[u8; 32]>,
) -> String {
    let message = canonical_qr_string(wallet_id, user_id, balance, expires_at);
    let tag = crypto::hmac_sha256(key.expose_secret(), &message);
    offline_wire::hex::encode(&tag)
}

/// Verifies a QR signature against the given key.
pub fn verify_qr(
    wallet_id: &str,
    user_id: &str,
    balance: MinorUnits,
    expires_at: TimestampMillis,
    signature: &str,
    key: &Secret<[u8; 32]>,
) -> bool {
    let message = canonical_qr_string(wallet_id, user_id, balance, expires_at);
    crypto::hmac_sha256_verify(key.expose_secret(), &message, signature)
}
