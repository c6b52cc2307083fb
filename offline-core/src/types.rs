//! Local entity types (§3).
//!
//! These are the on-device, storage-layer shapes. They carry fields (sync
//! state, cache metadata) that never cross the wire; [`offline_wire`] holds
//! the subset that does.

use offline_wire::money::MinorUnits;
pub use offline_wire::transaction::{LineItem, TransactionType};
use offline_wire::TimestampMillis;
use serde::{Deserialize, Serialize};

/// The central entity (§3): one offline-created payment or purchase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OfflineTransaction {
    pub id: String,
    pub receipt_id: String,
    #[serde(rename = "type")]
    pub ty: TransactionType,
    pub wallet_id: String,
    pub user_id: String,
    pub customer_name: Option<String>,
    pub amount: MinorUnits,
    pub balance_after: MinorUnits,
    pub items: Vec<LineItem>,
    pub stand_id: String,
    pub stand_name: String,
    pub staff_id: String,
    pub idempotency_key: String,
    pub signature: String,
    pub device_id: String,
    pub created_at: String,
    pub timestamp: TimestampMillis,

    // --- sync state (§3, §4.7); never sent on the wire --- //
    pub synced: bool,
    pub synced_at: Option<TimestampMillis>,
    pub sync_error: Option<String>,
    pub retry_count: u32,
    pub server_transaction_id: Option<String>,
    pub quarantined: Option<QuarantineReason>,
}

impl OfflineTransaction {
    /// True while this record is still eligible for `SyncProtocol` to pick
    /// up: not yet synced, and not quarantined.
    pub fn is_pending(&self) -> bool {
        !self.synced && self.quarantined.is_none()
    }

    pub fn to_wire(&self) -> offline_wire::transaction::OfflineTransactionWire {
        offline_wire::transaction::OfflineTransactionWire {
            id: self.id.clone(),
            receipt_id: self.receipt_id.clone(),
            ty: self.ty,
            wallet_id: self.wallet_id.clone(),
            user_id: self.user_id.clone(),
            customer_name: self.customer_name.clone(),
            amount: self.amount,
            balance_after: self.balance_after,
            items: self.items.clone(),
            stand_id: self.stand_id.clone(),
            stand_name: self.stand_name.clone(),
            staff_id: self.staff_id.clone(),
            idempotency_key: self.idempotency_key.clone(),
            signature: self.signature.clone(),
            device_id: self.device_id.clone(),
            created_at: self.created_at.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// The ambient, serializable rendering of why a transaction stopped
/// retrying (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum QuarantineReason {
    ServerRejected { detail: offline_wire::sync::RejectReason },
    RetryCeilingExceeded,
}

/// Local snapshot of a wallet balance with freshness metadata (§3, C5).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedWallet {
    pub wallet_id: String,
    pub user_id: String,
    pub customer_name: Option<String>,
    pub balance: MinorUnits,
    pub last_synced_at: TimestampMillis,
    pub last_used_at: Option<TimestampMillis>,
}

/// A short-lived signed QR payload cached locally (§3, C6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedQrCode {
    pub wallet_id: String,
    pub user_id: String,
    pub customer_name: Option<String>,
    pub balance: MinorUnits,
    pub expires_at: TimestampMillis,
    pub signature: String,
    pub cached_at: TimestampMillis,
}

impl CachedQrCode {
    pub fn is_expired(&self, now: TimestampMillis) -> bool {
        self.expires_at.as_i64() <= now.as_i64()
    }
}

/// A `(id, lastTouched)` entry in the duplicate-detection log (§3, C8).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessedTransactionEntry {
    pub id: String,
    pub last_touched: TimestampMillis,
}
