//! Uploads pending batches to the reconciliation endpoint and processes
//! results (§4.11, §6.1, C11).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use offline_wire::money::MinorUnits;
use offline_wire::sync::{SyncOutcome, SyncRequest, SyncResponse};
use offline_wire::TimestampMillis;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};

use crate::backoff;
use crate::concurrency::CancelToken;
use crate::error::Result;
use crate::ledger::OfflineLedger;
use crate::storage::Storage;
use crate::wallet_cache::WalletCache;

/// Whole-batch transport failure: the request never got a structured
/// per-entry response at all.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
}

/// The transport boundary for `POST /sync/offline-transactions` (§6.1).
/// Production binds to `reqwest`; tests bind to an in-memory fake that can
/// be scripted to return arbitrary per-entry outcomes or fail outright.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn upload(&self, req: SyncRequest) -> std::result::Result<SyncResponse, TransportError>;
}

/// Production [`SyncTransport`] backed by `reqwest`.
pub struct ReqwestSyncTransport {
    client: reqwest::Client,
    sync_url: String,
    bearer_token: String,
}

impl ReqwestSyncTransport {
    pub fn new(sync_url: impl Into<String>, bearer_token: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client config is static and known-valid");
        Self { client, sync_url: sync_url.into(), bearer_token: bearer_token.into() }
    }
}

#[async_trait]
impl SyncTransport for ReqwestSyncTransport {
    async fn upload(&self, req: SyncRequest) -> std::result::Result<SyncResponse, TransportError> {
        let response = self
            .client
            .post(&self.sync_url)
            .bearer_auth(&self.bearer_token)
            .json(&req)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Http { status: status.as_u16(), body });
        }

        response.json().await.map_err(|e| TransportError::Network(e.to_string()))
    }
}

/// An in-memory [`SyncTransport`] fake for tests: scripted with a closure
/// over the request.
pub struct FakeSyncTransport<F> {
    respond: F,
}

impl<F> FakeSyncTransport<F>
where
    F: Fn(&SyncRequest) -> std::result::Result<SyncResponse, TransportError> + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self { respond }
    }
}

#[async_trait]
impl<F> SyncTransport for FakeSyncTransport<F>
where
    F: Fn(&SyncRequest) -> std::result::Result<SyncResponse, TransportError> + Send + Sync,
{
    async fn upload(&self, req: SyncRequest) -> std::result::Result<SyncResponse, TransportError> {
        (self.respond)(&req)
    }
}

/// Outcome counters for one `run_once` call, for logging/testing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    pub accepted: usize,
    pub duplicate: usize,
    pub rejected: usize,
    pub transport_failed: usize,
}

impl SyncSummary {
    /// Total entries this batch resolved one way or another (excludes
    /// entries left in-flight for the next attempt).
    pub fn total_processed(&self) -> usize {
        self.accepted + self.duplicate + self.rejected + self.transport_failed
    }
}

pub struct SyncProtocol<LS: Storage, WS: Storage> {
    transport: Arc<dyn SyncTransport>,
    ledger: Arc<OfflineLedger<LS>>,
    wallet_cache: Arc<WalletCache<WS>>,
    device_id: String,
    retry_ceiling: u32,
}

impl<LS: Storage, WS: Storage> SyncProtocol<LS, WS> {
    pub fn new(
        transport: Arc<dyn SyncTransport>,
        ledger: Arc<OfflineLedger<LS>>,
        wallet_cache: Arc<WalletCache<WS>>,
        device_id: impl Into<String>,
        retry_ceiling: u32,
    ) -> Self {
        Self { transport, ledger, wallet_cache, device_id: device_id.into(), retry_ceiling }
    }

    /// Uploads one batch of Pending transactions and applies the result.
    /// Checks `cancel` before starting the network call; once the call has
    /// been made, this batch's result-handling always completes (§5) — only
    /// the *next* batch is skipped if cancellation was requested meanwhile.
    pub async fn run_once(&self, cancel: &CancelToken, now: TimestampMillis) -> Result<SyncSummary> {
        if cancel.is_cancelled() {
            return Ok(SyncSummary::default());
        }

        let batch = self.ledger.next_sync_batch();
        if batch.is_empty() {
            return Ok(SyncSummary::default());
        }

        let wallet_ids: HashMap<String, String> =
            batch.iter().map(|t| (t.id.clone(), t.wallet_id.clone())).collect();
        let batch_ids: Vec<String> = batch.iter().map(|t| t.id.clone()).collect();
        let batch_len = batch.len();

        let request =
            SyncRequest { device_id: self.device_id.clone(), transactions: batch.iter().map(|t| t.to_wire()).collect() };

        let span = info_span!("sync_batch", device_id = %self.device_id, batch_size = batch_len);
        let outcome = self.transport.upload(request).instrument(span).await;

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, batch_size = batch_len, "sync_batch: transport failure, will retry");
                for id in &batch_ids {
                    self.ledger.record_error(id, e.to_string(), self.retry_ceiling)?;
                }
                return Ok(SyncSummary { transport_failed: batch_len, ..Default::default() });
            }
        };

        let mut summary = SyncSummary::default();
        let mut handled: std::collections::HashSet<String> = std::collections::HashSet::new();

        for entry in response.results {
            handled.insert(entry.id.clone());
            match entry.outcome {
                SyncOutcome::Accepted => {
                    summary.accepted += 1;
                    self.apply_synced(&entry.id, entry.server_transaction_id, entry.authoritative_balance, &wallet_ids, now)?;
                }
                SyncOutcome::Duplicate => {
                    summary.duplicate += 1;
                    self.apply_synced(&entry.id, entry.server_transaction_id, entry.authoritative_balance, &wallet_ids, now)?;
                }
                SyncOutcome::Rejected { reason } => {
                    summary.rejected += 1;
                    self.ledger.quarantine_rejected(&entry.id, reason)?;
                }
            }
        }

        // any batch id the server didn't mention: release it so the next
        // batch can pick it up again, without counting it as an error.
        let unmentioned: Vec<String> = batch_ids.into_iter().filter(|id| !handled.contains(id)).collect();
        if !unmentioned.is_empty() {
            self.ledger.release_in_flight(&unmentioned);
        }

        info!(?summary, "sync_batch: finished");
        Ok(summary)
    }

    fn apply_synced(
        &self,
        id: &str,
        server_transaction_id: Option<String>,
        authoritative_balance: Option<MinorUnits>,
        wallet_ids: &HashMap<String, String>,
        now: TimestampMillis,
    ) -> Result<()> {
        self.ledger.mark_synced(id, server_transaction_id, now)?;
        if let (Some(balance), Some(wallet_id)) = (authoritative_balance, wallet_ids.get(id)) {
            self.wallet_cache.update_balance(wallet_id, balance, now)?;
        }
        Ok(())
    }

    /// Runs `run_once` in a loop, sleeping on the backoff schedule between
    /// empty/failed attempts, until `cancel` is observed.
    pub async fn run_loop(&self, cancel: CancelToken, now: impl Fn() -> TimestampMillis) {
        let mut backoffs = backoff::get_backoff_iter();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                result = self.run_once(&cancel, now()) => {
                    match result {
                        Ok(summary) if summary.accepted + summary.duplicate + summary.rejected > 0 => {
                            backoffs = backoff::get_backoff_iter();
                        }
                        _ => {}
                    }
                }
            }
            let wait = backoffs.next().expect("backoff iterator is infinite");
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}
