//! Computes effective balance and authorizes payment intents offline
//! (§4.9, C9).

use offline_wire::money::MinorUnits;
use offline_wire::TimestampMillis;

use crate::error::{OfflineCoreError, Result};
use crate::ledger::OfflineLedger;
use crate::storage::Storage;
use crate::types::CachedWallet;
use crate::wallet_cache::WalletCache;

/// Staleness threshold from §4.9: a `CachedWallet` last synced more than an
/// hour ago is still valid for payments but carries a warning.
pub const STALE_CACHE_THRESHOLD_MILLIS: i64 = 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub wallet: CachedWallet,
    pub effective_balance: MinorUnits,
    pub warning: Option<Warning>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// `CachedWallet.lastSyncedAt` is more than an hour old. Hours are
    /// rounded down.
    StaleCache { hours: i64 },
}

pub struct PaymentValidator;

impl PaymentValidator {
    /// §4.9: validates that `amount` can be authorized offline against
    /// `wallet_id`'s cached balance minus pending local debits.
    pub fn validate<WS: Storage, LS: Storage>(
        wallet_cache: &WalletCache<WS>,
        ledger: &OfflineLedger<LS>,
        wallet_id: &str,
        amount: MinorUnits,
        now: TimestampMillis,
    ) -> Result<ValidationResult> {
        if amount.as_u64() == 0 {
            return Err(OfflineCoreError::InvalidAmount);
        }

        let wallet = wallet_cache
            .get(wallet_id)
            .ok_or_else(|| OfflineCoreError::NotCached(wallet_id.to_owned()))?;

        let pending = ledger.pending_amount_for_wallet(wallet_id)?;
        let effective_balance = wallet.balance.as_u64().checked_sub(pending.as_u64()).ok_or_else(
            || OfflineCoreError::LedgerCorrupt("pending exceeds cached balance".into()),
        )?;
        let effective_balance = MinorUnits::new(effective_balance);

        if amount.as_u64() > effective_balance.as_u64() {
            return Err(OfflineCoreError::InsufficientBalance { available: effective_balance });
        }

        let warning = staleness_warning(wallet.last_synced_at, now);

        Ok(ValidationResult { wallet, effective_balance, warning })
    }
}

fn staleness_warning(last_synced_at: TimestampMillis, now: TimestampMillis) -> Option<Warning> {
    let age_millis = now.as_i64().saturating_sub(last_synced_at.as_i64());
    if age_millis > STALE_CACHE_THRESHOLD_MILLIS {
        Some(Warning::StaleCache { hours: age_millis / (60 * 60 * 1000) })
    } else {
        None
    }
}
