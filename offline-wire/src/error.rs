//! Serializable, machine-matchable error kinds.
//!
//! The core crate's fallible operations return a `thiserror`-derived
//! `OfflineCoreError` with full `Display` context for logs and operators.
//! This module defines the much smaller, `Copy` counterpart that survives a
//! trip over the wire (to a future telemetry pipeline, or back from the sync
//! endpoint's `rejected(reason)` outcome) without needing to parse strings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The serializable representation for a rejected or failed operation.
///
/// Mirrors `ErrorKind` + a human message, analogous to how a REST API
/// returns a machine-matchable error code alongside a display string.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub msg: String,
}

impl ErrorResponse {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, msg: msg.into() }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.msg)
    }
}

impl std::error::Error for ErrorResponse {}

/// The machine-matchable error kind taxonomy from the spec's error handling
/// design: Validation, Authorization, Crypto, Ledger, Sync.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    // --- Validation --- //
    InvalidAmount,
    InvalidWalletId,
    MalformedQr,

    // --- Authorization --- //
    InsufficientBalance,
    QrExpired,
    QrSignatureInvalid,
    NotCached,

    // --- Crypto --- //
    CryptoUnavailable,
    KeyStoreError,
    NoSigningKey,

    // --- Ledger --- //
    LedgerCorrupt,
    DuplicateTransaction,
    StorageError,

    // --- Sync --- //
    NetworkTransient,
    ServerRejected,
    Quarantined,
}

impl ErrorKind {
    /// Whether the operation that produced this error should be retried by
    /// the caller. Validation/Authorization/Crypto/Ledger errors never are;
    /// only `NetworkTransient` is.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::NetworkTransient)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidAmount => "InvalidAmount",
            Self::InvalidWalletId => "InvalidWalletId",
            Self::MalformedQr => "MalformedQr",
            Self::InsufficientBalance => "InsufficientBalance",
            Self::QrExpired => "QrExpired",
            Self::QrSignatureInvalid => "QrSignatureInvalid",
            Self::NotCached => "NotCached",
            Self::CryptoUnavailable => "CryptoUnavailable",
            Self::KeyStoreError => "KeyStoreError",
            Self::NoSigningKey => "NoSigningKey",
            Self::LedgerCorrupt => "LedgerCorrupt",
            Self::DuplicateTransaction => "DuplicateTransaction",
            Self::StorageError => "StorageError",
            Self::NetworkTransient => "NetworkTransient",
            Self::ServerRejected => "ServerRejected",
            Self::Quarantined => "Quarantined",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_network_transient_is_retryable() {
        for kind in [
            ErrorKind::InvalidAmount,
            ErrorKind::InsufficientBalance,
            ErrorKind::CryptoUnavailable,
            ErrorKind::LedgerCorrupt,
            ErrorKind::StorageError,
            ErrorKind::ServerRejected,
            ErrorKind::Quarantined,
        ] {
            assert!(!kind.is_retryable(), "{kind} should not be retryable");
        }
        assert!(ErrorKind::NetworkTransient.is_retryable());
    }

    #[test]
    fn error_response_round_trips_json() {
        let resp = ErrorResponse::new(ErrorKind::QrExpired, "expired 4s ago");
        let json = serde_json::to_string(&resp).unwrap();
        let back: ErrorResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(resp, back);
    }
}
