//! Short-lived signed QR payloads keyed by wallet (§4.6, C6).

use std::sync::Mutex;

use offline_wire::TimestampMillis;

use crate::error::Result;
use crate::storage::Storage;
use crate::types::CachedQrCode;

pub const STORAGE_KEY: &str = "cached_qr_codes";

/// Bound from §3: at most 50 cached QR codes.
pub const CAPACITY: usize = 50;

pub struct QrCache<S: Storage> {
    storage: S,
    entries: Mutex<Vec<CachedQrCode>>,
}

impl<S: Storage> QrCache<S> {
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

    fn persist(&self, entries: &[CachedQrCode]) -> Result<()> {
        let bytes = serde_json::to_vec(entries)
            .map_err(|e| crate::error::OfflineCoreError::LedgerCorrupt(e.to_string()))?;
        self.storage
            .write(STORAGE_KEY, &bytes)
            .map_err(|e| crate::error::OfflineCoreError::StorageError(e.to_string()))
    }

    /// Purges expired entries, then upserts by `walletId`; caps at
    /// `CAPACITY`.
    pub fn put(&self, code: CachedQrCode, now: TimestampMillis) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|c| !c.is_expired(now));
        entries.retain(|c| c.wallet_id != code.wallet_id);
        entries.push(code);
        while entries.len() > CAPACITY {
            entries.remove(0);
        }
        self.persist(&entries)
    }

    /// Returns a non-expired entry, or `None`. Opportunistically purges
    /// expired entries first (§4.6).
    pub fn get(&self, wallet_id: &str, now: TimestampMillis) -> Result<Option<CachedQrCode>> {
        self.purge_expired(now)?;
        let entries = self.entries.lock().unwrap();
        Ok(entries.iter().find(|c| c.wallet_id == wallet_id).cloned())
    }

    /// Idempotent: drops every entry with `expiresAt <= now`.
    pub fn purge_expired(&self, now: TimestampMillis) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|c| !c.is_expired(now));
        if entries.len() != before {
            self.persist(&entries)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use offline_wire::money::MinorUnits;

    use super::*;
    use crate::storage::MemStorage;

    fn code(wallet_id: &str, expires_at: i64) -> CachedQrCode {
        CachedQrCode {
            wallet_id: wallet_id.to_owned(),
            user_id: format!("user-{wallet_id}"),
            customer_name: None,
            balance: MinorUnits::new(5000),
            expires_at: TimestampMillis::from_millis(expires_at),
            signature: "deadbeef".to_owned(),
            cached_at: TimestampMillis::from_millis(0),
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = QrCache::load(MemStorage::new()).unwrap();
        let now = TimestampMillis::from_millis(1_000);
        cache.put(code("W1", 2_000), now).unwrap();
        assert!(cache.get("W1", now).unwrap().is_some());
    }

    #[test]
    fn expired_entries_are_purged_on_put_and_get() {
        let cache = QrCache::load(MemStorage::new()).unwrap();
        cache.put(code("W1", 500), TimestampMillis::from_millis(0)).unwrap();
        let now = TimestampMillis::from_millis(1_000);
        assert!(cache.get("W1", now).unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn caps_at_capacity() {
        let cache = QrCache::load(MemStorage::new()).unwrap();
        let now = TimestampMillis::from_millis(0);
        for i in 0..CAPACITY + 5 {
            cache.put(code(&format!("W{i}"), 1_000_000), now).unwrap();
        }
        assert_eq!(cache.len(), CAPACITY);
    }

    proptest::proptest! {
        #[test]
        fn never_exceeds_capacity_for_any_put_sequence(
            ids in proptest::collection::vec(0u32..200, 0..200),
        ) {
            let cache = QrCache::load(MemStorage::new()).unwrap();
            let now = TimestampMillis::from_millis(0);
            for id in ids {
                cache.put(code(&format!("W{id}"), 1_000_000), now).unwrap();
                proptest::prop_assert!(cache.len() <= CAPACITY);
            }
        }

        #[test]
        fn get_never_returns_an_expired_entry(
            expires_at in 0i64..2_000, query_at in 0i64..2_000,
        ) {
            let cache = QrCache::load(MemStorage::new()).unwrap();
            cache.put(code("W1", expires_at), TimestampMillis::from_millis(0)).unwrap();
            let found = cache.get("W1", TimestampMillis::from_millis(query_at)).unwrap();
            proptest::prop_assert_eq!(found.is_some(), query_at < expires_at);
        }
    }
}
