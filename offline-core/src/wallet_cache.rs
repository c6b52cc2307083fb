//! Local snapshot of wallet balances with freshness metadata (§4.5, C5).

use std::sync::Mutex;

use offline_wire::money::MinorUnits;
use offline_wire::TimestampMillis;

use crate::error::Result;
use crate::storage::Storage;
use crate::types::CachedWallet;

pub const STORAGE_KEY: &str = "cached_wallets";

/// Bound from §3: the 100 most recently used wallets are kept, LRU-evicted.
pub const CAPACITY: usize = 100;

/// Pure state container over a bounded, LRU-ordered set of [`CachedWallet`]s.
///
/// Entries are kept least-recently-used first so eviction is a pop from the
/// front; `CAPACITY` is small enough that a linear scan to reorder on touch
/// is simpler and fast enough versus a hashmap + intrusive list.
pub struct WalletCache<S: Storage> {
    storage: S,
    entries: Mutex<Vec<CachedWallet>>,
}

impl<S: Storage> WalletCache<S> {
    pub fn load(storage: S) -> Result<Self> {
        let entries = match storage
            .read_opt(STORAGE_KEY)
            .map_err(|e| crate::error::OfflineCoreError::StorageError(e.to_string()))?
        {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| crate::error::OfflineCoreError::LedgerCorrupt(e.to_string()))?,
            None => Vec::new(),
        };
        Ok(Self { storage, entries: Mutex::new(entries) })
    }

    fn persist(&self, entries: &[CachedWallet]) -> Result<()> {
        let bytes = serde_json::to_vec(entries)
            .map_err(|e| crate::error::OfflineCoreError::LedgerCorrupt(e.to_string()))?;
        self.storage
            .write(STORAGE_KEY, &bytes)
            .map_err(|e| crate::error::OfflineCoreError::StorageError(e.to_string()))
    }

    /// Insert/update; enforces the `CAPACITY`-entry LRU cap.
    pub fn put(&self, wallet: CachedWallet) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|w| w.wallet_id != wallet.wallet_id);
        entries.push(wallet);
        while entries.len() > CAPACITY {
            entries.remove(0);
        }
        self.persist(&entries)
    }

    pub fn get(&self, wallet_id: &str) -> Option<CachedWallet> {
        let entries = self.entries.lock().unwrap();
        entries.iter().find(|w| w.wallet_id == wallet_id).cloned()
    }

    /// Updates `balance` and touches `lastUsedAt`.
    pub fn update_balance(
        &self,
        wallet_id: &str,
        new_balance: MinorUnits,
        now: TimestampMillis,
    ) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(pos) = entries.iter().position(|w| w.wallet_id == wallet_id) {
            let mut wallet = entries.remove(pos);
            wallet.balance = new_balance;
            wallet.last_used_at = Some(now);
            entries.push(wallet);
        }
        self.persist(&entries)
    }

    /// Called on logout.
    pub fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.clear();
        self.persist(&entries)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
