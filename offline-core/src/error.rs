//! Error taxonomy (§7).
//!
//! One `thiserror` enum covering every fallible surface in this crate.
//! Policy (§7): Validation/Authorization errors are reported to the caller
//! and never retried; Crypto/Ledger errors are fatal for the operation and
//! must be surfaced to the operator; Sync transient errors are retried with
//! backoff, `ServerRejected` quarantines.

use offline_wire::money::MinorUnits;
use offline_wire::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OfflineCoreError {
    // --- Validation --- //
    #[error("amount must be a positive integer number of minor units")]
    InvalidAmount,
    #[error("wallet id must be non-empty")]
    InvalidWalletId,
    #[error("malformed QR payload: {0}")]
    MalformedQr(String),

    // --- Authorization --- //
    #[error("insufficient balance: only {available} available")]
    InsufficientBalance { available: MinorUnits },
    #[error("QR payload has expired")]
    QrExpired,
    #[error("QR payload signature does not verify")]
    QrSignatureInvalid,
    #[error("wallet {0} is not in the local cache")]
    NotCached(String),

    // --- Crypto --- //
    #[error("cryptographic primitive unavailable: {0}")]
    CryptoUnavailable(String),
    #[error("key store error: {0}")]
    KeyStoreError(String),
    #[error(
        "no SigningKey has been provisioned and DeviceSecret fallback is \
         disabled by this device's configuration"
    )]
    NoSigningKey,

    // --- Ledger --- //
    #[error("offline ledger is corrupt: {0}")]
    LedgerCorrupt(String),
    #[error("transaction {0} was already processed")]
    DuplicateTransaction(String),
    #[error("storage error: {0}")]
    StorageError(String),

    // --- Sync --- //
    #[error("transient network error: {0}")]
    NetworkTransient(String),
    #[error("server rejected transaction {id}: {reason:?}")]
    ServerRejected { id: String, reason: offline_wire::sync::RejectReason },
    #[error("transaction {0} is quarantined and requires operator action")]
    Quarantined(String),
}

impl OfflineCoreError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount => ErrorKind::InvalidAmount,
            Self::InvalidWalletId => ErrorKind::InvalidWalletId,
            Self::MalformedQr(_) => ErrorKind::MalformedQr,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::QrExpired => ErrorKind::QrExpired,
            Self::QrSignatureInvalid => ErrorKind::QrSignatureInvalid,
            Self::NotCached(_) => ErrorKind::NotCached,
            Self::CryptoUnavailable(_) => ErrorKind::CryptoUnavailable,
            Self::KeyStoreError(_) => ErrorKind::KeyStoreError,
            Self::NoSigningKey => ErrorKind::NoSigningKey,
            Self::LedgerCorrupt(_) => ErrorKind::LedgerCorrupt,
            Self::DuplicateTransaction(_) => ErrorKind::DuplicateTransaction,
            Self::StorageError(_) => ErrorKind::StorageError,
            Self::NetworkTransient(_) => ErrorKind::NetworkTransient,
            Self::ServerRejected { .. } => ErrorKind::ServerRejected,
            Self::Quarantined(_) => ErrorKind::Quarantined,
        }
    }

    /// Policy from §7: is this class of error one `SyncProtocol` should
    /// retry with backoff?
    pub const fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

pub type Result<T> = std::result::Result<T, OfflineCoreError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kind_mapping_is_exhaustive_and_stable() {
        assert_eq!(OfflineCoreError::InvalidAmount.kind(), ErrorKind::InvalidAmount);
        assert_eq!(
            OfflineCoreError::InsufficientBalance { available: MinorUnits::new(800) }
                .kind(),
            ErrorKind::InsufficientBalance
        );
        assert!(!OfflineCoreError::InvalidAmount.is_retryable());
        assert!(OfflineCoreError::NetworkTransient("timeout".into()).is_retryable());
    }
}
