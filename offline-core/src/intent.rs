//! Assembles and signs a new purchase intent (§4.4, C4).
//!
//! This is the one place that turns a cashier's line items into a fully
//! formed, signed [`OfflineTransaction`] — id, receipt id, idempotency key,
//! canonical signature, all computed the same way regardless of caller.
//! `OfflineLedger::create` and `PaymentValidator::validate` still own
//! persistence and authorization respectively; this module only builds the
//! record.

use offline_wire::money::MinorUnits;
use offline_wire::transaction::{LineItem, TransactionType};
use offline_wire::TimestampMillis;
use secrecy::ExposeSecret;

use crate::crypto;
use crate::error::{OfflineCoreError, Result};
use crate::key_store::SecureKeyStore;
use crate::receipt;
use crate::secret_storage::SecretStorage;
use crate::signer;
use crate::types::OfflineTransaction;

/// Builds and signs a `PURCHASE` transaction.
///
/// `effective_balance_before` is the caller's already-validated result from
/// [`crate::payment_validator::PaymentValidator::validate`] — this function
/// does not re-authorize, it only derives `balanceAfter` from it and fails
/// closed (§invariant 2) if the arithmetic would go negative.
pub fn prepare_purchase<S: SecretStorage>(
    key_store: &SecureKeyStore<S>,
    wallet_id: &str,
    user_id: &str,
    customer_name: Option<String>,
    items: Vec<LineItem>,
    stand_id: &str,
    stand_name: &str,
    staff_id: &str,
    effective_balance_before: MinorUnits,
    require_signing_key: bool,
    now: TimestampMillis,
) -> Result<OfflineTransaction> {
    let amount = sum_line_items(&items)?;
    let balance_after = effective_balance_before
        .as_u64()
        .checked_sub(amount.as_u64())
        .ok_or(OfflineCoreError::InsufficientBalance { available: effective_balance_before })?;

    let device_secret = key_store.get_or_create_device_secret()?;
    let device_id = key_store.device_identifier()?;
    let signing_key = key_store.resolve_signing_key(require_signing_key)?;
    let receipt_id = receipt::generate_receipt_id(device_secret.expose_secret(), now)?;
    let id = crypto::uuid_v4()?;
    let idempotency_key = format!(
        "offline_{}_{}",
        crypto::to_base36(now.as_i64().max(0) as u64),
        &id[..8]
    );
    let created_at = iso8601_millis(now);

    let mut txn = OfflineTransaction {
        id,
        receipt_id,
        ty: TransactionType::Purchase,
        wallet_id: wallet_id.to_owned(),
        user_id: user_id.to_owned(),
        customer_name,
        amount,
        balance_after: MinorUnits::new(balance_after),
        items,
        stand_id: stand_id.to_owned(),
        stand_name: stand_name.to_owned(),
        staff_id: staff_id.to_owned(),
        idempotency_key,
        signature: String::new(),
        device_id,
        created_at,
        timestamp: now,
        synced: false,
        synced_at: None,
        sync_error: None,
        retry_count: 0,
        server_transaction_id: None,
        quarantined: None,
    };
    txn.signature = signer::sign_transaction(&txn, &signing_key);
    Ok(txn)
}

fn sum_line_items(items: &[LineItem]) -> Result<MinorUnits> {
    if items.is_empty() {
        return Err(OfflineCoreError::InvalidAmount);
    }
    let mut total: u64 = 0;
    for item in items {
        total = total
            .checked_add(item.total_price.as_u64())
            .ok_or_else(|| OfflineCoreError::LedgerCorrupt("line item total overflows".into()))?;
    }
    if total == 0 {
        return Err(OfflineCoreError::InvalidAmount);
    }
    Ok(MinorUnits::new(total))
}

fn iso8601_millis(ts: TimestampMillis) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ts.as_i64())
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .unwrap_or_else(|| "1970-01-01T00:00:00.000Z".to_owned())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::secret_storage::MemSecretStorage;

    fn line_item(amount: u64) -> LineItem {
        LineItem {
            product_id: "P1".into(),
            product_name: "Beer".into(),
            quantity: 1,
            unit_price: MinorUnits::new(amount),
            total_price: MinorUnits::new(amount),
        }
    }

    #[test]
    fn assembles_a_self_consistent_signed_transaction() {
        let key_store = SecureKeyStore::new(MemSecretStorage::new());
        let now = TimestampMillis::from_millis(1_800_000_000_000);

        let txn = prepare_purchase(
            &key_store,
            "W1",
            "U1",
            Some("Alex".into()),
            vec![line_item(1500)],
            "S1",
            "Main Bar",
            "staff-1",
            MinorUnits::new(5000),
            false,
            now,
        )
        .unwrap();

        assert_eq!(txn.amount, MinorUnits::new(1500));
        assert_eq!(txn.balance_after, MinorUnits::new(3500));
        assert!(txn.idempotency_key.starts_with("offline_"));
        assert!(txn.created_at.ends_with('Z'));

        let signing_key = key_store.resolve_signing_key(false).unwrap();
        assert!(signer::verify_transaction(&txn, &signing_key));
    }

    #[test]
    fn insufficient_balance_fails_closed() {
        let key_store = SecureKeyStore::new(MemSecretStorage::new());
        let now = TimestampMillis::from_millis(0);

        let err = prepare_purchase(
            &key_store,
            "W1",
            "U1",
            None,
            vec![line_item(1000)],
            "S1",
            "Main Bar",
            "staff-1",
            MinorUnits::new(500),
            false,
            now,
        )
        .unwrap_err();
        assert!(matches!(err, OfflineCoreError::InsufficientBalance { .. }));
    }

    #[test]
    fn empty_items_is_invalid() {
        let key_store = SecureKeyStore::new(MemSecretStorage::new());
        let err = prepare_purchase(
            &key_store,
            "W1",
            "U1",
            None,
            vec![],
            "S1",
            "Main Bar",
            "staff-1",
            MinorUnits::new(500),
            false,
            TimestampMillis::from_millis(0),
        )
        .unwrap_err();
        assert!(matches!(err, OfflineCoreError::InvalidAmount));
    }
}
