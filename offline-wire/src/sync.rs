//! Wire types for `POST /sync/offline-transactions` (§6, §4.11).

use serde::{Deserialize, Serialize};

use crate::money::MinorUnits;
use crate::transaction::OfflineTransactionWire;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub device_id: String,
    pub transactions: Vec<OfflineTransactionWire>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub results: Vec<SyncResultEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResultEntry {
    pub id: String,
    pub outcome: SyncOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authoritative_balance: Option<MinorUnits>,
}

/// The per-entry result of a sync batch upload.
///
/// `rejected` carries a [`RejectReason`] and is the only outcome that moves
/// a transaction to quarantine rather than marking it synced or retrying it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Accepted,
    Duplicate,
    Rejected { reason: RejectReason },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    SignatureInvalid,
    StaleTimestamp,
    WalletFrozen,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn outcome_round_trips_through_json() {
        let entries = vec![
            SyncResultEntry {
                id: "t1".to_owned(),
                outcome: SyncOutcome::Accepted,
                server_transaction_id: Some("srv-1".to_owned()),
                authoritative_balance: Some(MinorUnits::new(3800)),
            },
            SyncResultEntry {
                id: "t2".to_owned(),
                outcome: SyncOutcome::Rejected {
                    reason: RejectReason::SignatureInvalid,
                },
                server_transaction_id: None,
                authoritative_balance: None,
            },
        ];
        let resp = SyncResponse { results: entries.clone() };
        let json = serde_json::to_string(&resp).unwrap();
        let back: SyncResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.results, entries);
    }
}
