//! Time-bounded set of processed transaction IDs (§4.8, C8).

use std::sync::Mutex;

use offline_wire::TimestampMillis;

use crate::error::Result;
use crate::storage::Storage;
use crate::types::ProcessedTransactionEntry;

pub const STORAGE_KEY: &str = "processed_transaction_ids_v2";

/// Default TTL from §3: 7 days.
pub const TTL_MILLIS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Cap from §4.8.
pub const CAPACITY: usize = 1000;

/// Backed by a list of `(id, lastTouched)` entries, LRU by timestamp and
/// TTL-expired on read.
pub struct DuplicateGuard<S: Storage> {
    storage: S,
    entries: Mutex<Vec<ProcessedTransactionEntry>>,
}

impl<S: Storage> DuplicateGuard<S> {
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

    fn persist(&self, entries: &[ProcessedTransactionEntry]) -> Result<()> {
        let bytes = serde_json::to_vec(entries)
            .map_err(|e| crate::error::OfflineCoreError::LedgerCorrupt(e.to_string()))?;
        self.storage
            .write(STORAGE_KEY, &bytes)
            .map_err(|e| crate::error::OfflineCoreError::StorageError(e.to_string()))
    }

    fn is_expired(entry: &ProcessedTransactionEntry, now: TimestampMillis) -> bool {
        now.as_i64().saturating_sub(entry.last_touched.as_i64()) > TTL_MILLIS
    }

    /// Refreshes `id`'s timestamp, inserting it if new. Enforces the
    /// `CAPACITY` cap by evicting the least-recently-touched entry.
    pub fn add(&self, id: &str, now: TimestampMillis) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|e| e.id != id);
        entries.push(ProcessedTransactionEntry { id: id.to_owned(), last_touched: now });
        entries.sort_by_key(|e| e.last_touched.as_i64());
        while entries.len() > CAPACITY {
            entries.remove(0);
        }
        self.persist(&entries)
    }

    /// True iff an unexpired entry for `id` exists.
    pub fn contains(&self, id: &str, now: TimestampMillis) -> bool {
        let entries = self.entries.lock().unwrap();
        entries.iter().any(|e| e.id == id && !Self::is_expired(e, now))
    }

    /// Drops entries older than `TTL_MILLIS`.
    pub fn cleanup(&self, now: TimestampMillis) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| !Self::is_expired(e, now));
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
