//! Append-only local log of offline transactions and its sync state
//! machine (§4.7, C7).
//!
//! States: **Pending -> Syncing -> Synced**, with a self-loop
//! **Pending -> Pending(retryCount+1)** on transient failures, and a
//! **quarantined** sub-state on server rejection or exceeding the retry
//! ceiling. There is no direct deletion from Pending; terminal deletion
//! from Synced only happens via [`OfflineLedger::clear_synced_transactions`].
//!
//! `create` is the one operation that must be atomic across the ledger,
//! `DuplicateGuard`, and `WalletCache`. Since every method here is
//! synchronous (no `.await` inside the critical section) and always
//! acquires the ledger's own lock first, callers that only ever go through
//! `create` observe the same effective atomicity the single shared mutex in
//! §5 describes, without literally sharing one `Mutex` type across three
//! independently-testable components.

use std::collections::HashSet;
use std::sync::Mutex;

use offline_wire::money::MinorUnits;
use offline_wire::sync::RejectReason;
use offline_wire::TimestampMillis;
use tracing::{info, warn};

use crate::duplicate_guard::DuplicateGuard;
use crate::error::{OfflineCoreError, Result};
use crate::storage::Storage;
use crate::types::{OfflineTransaction, QuarantineReason};
use crate::wallet_cache::WalletCache;

pub const STORAGE_KEY: &str = "offline_transactions_v2";

pub struct OfflineLedger<S: Storage> {
    storage: S,
    transactions: Mutex<Vec<OfflineTransaction>>,
    in_flight: Mutex<HashSet<String>>,
}

impl<S: Storage> OfflineLedger<S> {
    pub fn load(storage: S) -> Result<Self> {
        let transactions = match storage
            .read_opt(STORAGE_KEY)
            .map_err(|e| OfflineCoreError::StorageError(e.to_string()))?
        {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| OfflineCoreError::LedgerCorrupt(e.to_string()))?,
            None => Vec::new(),
        };
        Ok(Self {
            storage,
            transactions: Mutex::new(transactions),
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    fn persist(&self, transactions: &[OfflineTransaction]) -> Result<()> {
        let bytes = serde_json::to_vec(transactions)
            .map_err(|e| OfflineCoreError::LedgerCorrupt(e.to_string()))?;
        self.storage
            .write(STORAGE_KEY, &bytes)
            .map_err(|e| OfflineCoreError::StorageError(e.to_string()))
    }

    /// Inserts a signed Pending transaction. Atomic with `duplicate_guard`
    /// and `wallet_cache` updates (§4.7 invariant).
    pub fn create<DS: Storage, WS: Storage>(
        &self,
        txn: OfflineTransaction,
        duplicate_guard: &DuplicateGuard<DS>,
        wallet_cache: &WalletCache<WS>,
        now: TimestampMillis,
    ) -> Result<OfflineTransaction> {
        let mut transactions = self.transactions.lock().unwrap();

        if duplicate_guard.contains(&txn.id, now)
            || transactions.iter().any(|t| t.id == txn.id || t.idempotency_key == txn.idempotency_key)
        {
            return Err(OfflineCoreError::DuplicateTransaction(txn.id));
        }

        transactions.push(txn.clone());
        self.persist(&transactions)?;
        duplicate_guard.add(&txn.id, now)?;

        // The cache's balance is a mirror of the server's authoritative
        // value (§4.9 edge note / S1): creation only touches `lastUsedAt`,
        // it never adjusts `balance` locally. The debit is reflected
        // instead through `pending_amount_for_wallet` until the server
        // confirms it via `SyncProtocol`.
        if let Some(cached) = wallet_cache.get(&txn.wallet_id) {
            wallet_cache.update_balance(&txn.wallet_id, cached.balance, now)?;
        }

        info!(
            id = %txn.id,
            wallet_id = %txn.wallet_id,
            amount = %txn.amount,
            "ledger: created pending transaction"
        );
        Ok(txn)
    }

    pub fn get(&self, id: &str) -> Option<OfflineTransaction> {
        self.transactions.lock().unwrap().iter().find(|t| t.id == id).cloned()
    }

    /// Sum of `amount` over non-synced, non-quarantined transactions for
    /// `wallet_id` (§4.9 step 2). `LedgerCorrupt` on overflow (§4.9 edge
    /// policy).
    pub fn pending_amount_for_wallet(&self, wallet_id: &str) -> Result<MinorUnits> {
        let transactions = self.transactions.lock().unwrap();
        let mut total = MinorUnits::ZERO;
        for txn in transactions.iter().filter(|t| t.is_pending() && t.wallet_id == wallet_id) {
            total = total
                .checked_add(txn.amount)
                .ok_or_else(|| OfflineCoreError::LedgerCorrupt("pending sum overflow".into()))?;
        }
        Ok(total)
    }

    /// Snapshot of records eligible for the next sync batch, in FIFO order
    /// by `timestamp` (ties broken by `id`, §4.7). Marks the returned ids
    /// in-flight so a concurrent call does not pick them up too.
    pub fn next_sync_batch(&self) -> Vec<OfflineTransaction> {
        let transactions = self.transactions.lock().unwrap();
        let mut in_flight = self.in_flight.lock().unwrap();

        let mut batch: Vec<OfflineTransaction> = transactions
            .iter()
            .filter(|t| t.is_pending() && !in_flight.contains(&t.id))
            .cloned()
            .collect();
        batch.sort_by(|a, b| a.timestamp.as_i64().cmp(&b.timestamp.as_i64()).then_with(|| a.id.cmp(&b.id)));
        for txn in &batch {
            in_flight.insert(txn.id.clone());
        }
        batch
    }

    /// Releases ids from the in-flight set without changing their sync
    /// state, e.g. after a whole-batch transport failure.
    pub fn release_in_flight(&self, ids: &[String]) {
        let mut in_flight = self.in_flight.lock().unwrap();
        for id in ids {
            in_flight.remove(id);
        }
    }

    pub fn mark_synced(
        &self,
        id: &str,
        server_transaction_id: Option<String>,
        now: TimestampMillis,
    ) -> Result<()> {
        let mut transactions = self.transactions.lock().unwrap();
        let Some(txn) = transactions.iter_mut().find(|t| t.id == id) else {
            return Err(OfflineCoreError::LedgerCorrupt(format!("unknown transaction {id}")));
        };
        txn.synced = true;
        txn.synced_at = Some(now);
        txn.server_transaction_id = server_transaction_id;
        txn.sync_error = None;
        self.persist(&transactions)?;
        self.in_flight.lock().unwrap().remove(id);
        info!(%id, "ledger: marked synced");
        Ok(())
    }

    /// Transient sync failure: increments `retryCount`, returns to Pending,
    /// or moves to quarantine if `retry_ceiling` is exceeded.
    pub fn record_error(&self, id: &str, err: String, retry_ceiling: u32) -> Result<()> {
        let mut transactions = self.transactions.lock().unwrap();
        let Some(txn) = transactions.iter_mut().find(|t| t.id == id) else {
            return Err(OfflineCoreError::LedgerCorrupt(format!("unknown transaction {id}")));
        };
        txn.sync_error = Some(err);
        txn.retry_count += 1;
        if txn.retry_count > retry_ceiling {
            txn.quarantined = Some(QuarantineReason::RetryCeilingExceeded);
            warn!(%id, retry_count = txn.retry_count, "ledger: quarantined after exceeding retry ceiling");
        }
        self.persist(&transactions)?;
        self.in_flight.lock().unwrap().remove(id);
        Ok(())
    }

    /// Server rejected for a non-retryable reason: quarantine immediately,
    /// never refund the local balance (§4.11).
    pub fn quarantine_rejected(&self, id: &str, reason: RejectReason) -> Result<()> {
        let mut transactions = self.transactions.lock().unwrap();
        let Some(txn) = transactions.iter_mut().find(|t| t.id == id) else {
            return Err(OfflineCoreError::LedgerCorrupt(format!("unknown transaction {id}")));
        };
        txn.quarantined = Some(QuarantineReason::ServerRejected { detail: reason });
        self.persist(&transactions)?;
        self.in_flight.lock().unwrap().remove(id);
        warn!(%id, ?reason, "ledger: quarantined by server rejection");
        Ok(())
    }

    /// Compactor: deletes every Synced record. Terminal deletion only
    /// happens here (§4.7).
    pub fn clear_synced_transactions(&self) -> Result<usize> {
        let mut transactions = self.transactions.lock().unwrap();
        let before = transactions.len();
        transactions.retain(|t| !t.synced);
        let removed = before - transactions.len();
        if removed > 0 {
            self.persist(&transactions)?;
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.transactions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use offline_wire::transaction::{LineItem, TransactionType};

    use super::*;
    use crate::storage::MemStorage;
    use crate::types::CachedWallet;

    fn txn(id: &str, wallet_id: &str, amount: u64, timestamp: i64) -> OfflineTransaction {
        OfflineTransaction {
            id: id.to_owned(),
            receipt_id: "OFF-ABCD-1234".into(),
            ty: TransactionType::Purchase,
            wallet_id: wallet_id.to_owned(),
            user_id: "U1".into(),
            customer_name: None,
            amount: MinorUnits::new(amount),
            balance_after: MinorUnits::new(5000 - amount),
            items: vec![LineItem {
                product_id: "P1".into(),
                product_name: "Beer".into(),
                quantity: 1,
                unit_price: MinorUnits::new(amount),
                total_price: MinorUnits::new(amount),
            }],
            stand_id: "S1".into(),
            stand_name: "Main".into(),
            staff_id: "staff-1".into(),
            idempotency_key: format!("offline_{id}"),
            signature: "deadbeef".into(),
            device_id: "cafebabe".into(),
            created_at: "2026-07-28T00:00:00Z".into(),
            timestamp: TimestampMillis::from_millis(timestamp),
            synced: false,
            synced_at: None,
            sync_error: None,
            retry_count: 0,
            server_transaction_id: None,
            quarantined: None,
        }
    }

    fn wallet_cache_with(wallet_id: &str) -> WalletCache<MemStorage> {
        let cache = WalletCache::load(MemStorage::new()).unwrap();
        cache
            .put(CachedWallet {
                wallet_id: wallet_id.to_owned(),
                user_id: "U1".into(),
                customer_name: None,
                balance: MinorUnits::new(5000),
                last_synced_at: TimestampMillis::from_millis(0),
                last_used_at: None,
            })
            .unwrap();
        cache
    }

    #[test]
    fn create_is_atomic_with_duplicate_guard_and_wallet_cache() {
        let ledger = OfflineLedger::load(MemStorage::new()).unwrap();
        let guard = DuplicateGuard::load(MemStorage::new()).unwrap();
        let cache = wallet_cache_with("W1");
        let now = TimestampMillis::from_millis(1_000);

        ledger.create(txn("t1", "W1", 1500, 1_000), &guard, &cache, now).unwrap();
        assert!(guard.contains("t1", now));
        // cache balance is a server mirror: creation never adjusts it locally (S1)
        assert_eq!(cache.get("W1").unwrap().balance, MinorUnits::new(5000));
        assert_eq!(cache.get("W1").unwrap().last_used_at, Some(now));
    }

    #[test]
    fn create_rejects_duplicate_id() {
        let ledger = OfflineLedger::load(MemStorage::new()).unwrap();
        let guard = DuplicateGuard::load(MemStorage::new()).unwrap();
        let cache = wallet_cache_with("W1");
        let now = TimestampMillis::from_millis(1_000);

        ledger.create(txn("t1", "W1", 1500, 1_000), &guard, &cache, now).unwrap();
        let err = ledger.create(txn("t1", "W1", 200, 2_000), &guard, &cache, now).unwrap_err();
        assert!(matches!(err, OfflineCoreError::DuplicateTransaction(_)));
    }

    #[test]
    fn next_sync_batch_is_fifo_by_timestamp_then_id() {
        let ledger = OfflineLedger::load(MemStorage::new()).unwrap();
        let guard = DuplicateGuard::load(MemStorage::new()).unwrap();
        let cache = wallet_cache_with("W1");

        ledger.create(txn("b", "W1", 100, 2_000), &guard, &cache, TimestampMillis::from_millis(1)).unwrap();
        ledger.create(txn("a", "W1", 100, 1_000), &guard, &cache, TimestampMillis::from_millis(2)).unwrap();
        ledger.create(txn("z", "W1", 100, 1_000), &guard, &cache, TimestampMillis::from_millis(3)).unwrap();

        let batch = ledger.next_sync_batch();
        let ids: Vec<&str> = batch.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "z", "b"]);
    }

    #[test]
    fn mark_synced_then_clear_compacts() {
        let ledger = OfflineLedger::load(MemStorage::new()).unwrap();
        let guard = DuplicateGuard::load(MemStorage::new()).unwrap();
        let cache = wallet_cache_with("W1");
        let now = TimestampMillis::from_millis(1_000);
        ledger.create(txn("t1", "W1", 100, 1_000), &guard, &cache, now).unwrap();

        ledger.mark_synced("t1", Some("srv-1".into()), now).unwrap();
        assert!(ledger.get("t1").unwrap().synced);

        let removed = ledger.clear_synced_transactions().unwrap();
        assert_eq!(removed, 1);
        assert!(ledger.is_empty());
    }

    #[test]
    fn record_error_quarantines_past_retry_ceiling() {
        let ledger = OfflineLedger::load(MemStorage::new()).unwrap();
        let guard = DuplicateGuard::load(MemStorage::new()).unwrap();
        let cache = wallet_cache_with("W1");
        let now = TimestampMillis::from_millis(1_000);
        ledger.create(txn("t1", "W1", 100, 1_000), &guard, &cache, now).unwrap();

        for _ in 0..3 {
            ledger.record_error("t1", "timeout".into(), 2).unwrap();
        }
        let txn = ledger.get("t1").unwrap();
        assert!(txn.quarantined.is_some());
        assert_eq!(txn.retry_count, 3);
    }

    #[test]
    fn quarantine_rejected_does_not_adjust_balance() {
        let ledger = OfflineLedger::load(MemStorage::new()).unwrap();
        let guard = DuplicateGuard::load(MemStorage::new()).unwrap();
        let cache = wallet_cache_with("W1");
        let now = TimestampMillis::from_millis(1_000);
        ledger.create(txn("t1", "W1", 100, 1_000), &guard, &cache, now).unwrap();
        let balance_before = cache.get("W1").unwrap().balance;

        ledger.quarantine_rejected("t1", RejectReason::SignatureInvalid).unwrap();
        assert!(ledger.get("t1").unwrap().quarantined.is_some());
        assert_eq!(cache.get("W1").unwrap().balance, balance_before);
    }

    #[test]
    fn pending_amount_sums_only_pending() {
        let ledger = OfflineLedger::load(MemStorage::new()).unwrap();
        let guard = DuplicateGuard::load(MemStorage::new()).unwrap();
        let cache = wallet_cache_with("W1");
        let now = TimestampMillis::from_millis(1_000);
        ledger.create(txn("t1", "W1", 500, 1_000), &guard, &cache, now).unwrap();
        ledger.create(txn("t2", "W1", 700, 1_000), &guard, &cache, now).unwrap();
        ledger.mark_synced("t1", None, now).unwrap();

        assert_eq!(ledger.pending_amount_for_wallet("W1").unwrap(), MinorUnits::new(700));
    }
}
