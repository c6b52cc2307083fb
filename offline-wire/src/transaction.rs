//! Wire form of an offline transaction, and its line items.
//!
//! This is what actually crosses the wire to `POST /sync/offline-transactions`
//! (§6): it drops the purely-local sync bookkeeping fields (`synced`,
//! `syncedAt`, `syncError`, `retryCount`) that only matter to this device's
//! own ledger.

use serde::{Deserialize, Serialize};

use crate::money::MinorUnits;
use crate::time::TimestampMillis;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Purchase,
    Payment,
}

impl TransactionType {
    /// The literal string used both on the wire and in the canonical
    /// signing string (§4.4): `"PURCHASE"` or `"PAYMENT"`.
    pub const fn as_wire_str(self) -> &'static str {
        match self {
            Self::Purchase => "PURCHASE",
            Self::Payment => "PAYMENT",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: MinorUnits,
    pub total_price: MinorUnits,
}

/// The wire form of an `OfflineTransaction`: everything the server needs to
/// independently verify and apply the transaction, and nothing about this
/// device's local sync bookkeeping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineTransactionWire {
    pub id: String,
    pub receipt_id: String,
    #[serde(rename = "type")]
    pub ty: TransactionType,
    pub wallet_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
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
}
