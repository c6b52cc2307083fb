//! Device-level configuration and session material (§4.13, A2).

use std::time::Duration;

use secrecy::Secret;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::Storage;

pub const STORAGE_KEY: &str = "device_config_v1";

/// Persistent, device-level settings. Not a secret: lives alongside the
/// ledger in ordinary [`Storage`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceConfig {
    pub festival_id: String,
    pub device_label: String,
    pub sync_url: String,
    pub auth_url: String,
    /// Open Question 1 (§9): when `true`, `TransactionSigner` refuses to
    /// fall back to `DeviceSecret` and fails with `NoSigningKey` instead.
    /// Defaults to `false` (the permissive §4.4 fallback behavior).
    #[serde(default)]
    pub require_signing_key: bool,
    #[serde(with = "duration_millis")]
    pub request_timeout: Duration,
    #[serde(with = "duration_millis")]
    pub retry_cycle_timeout: Duration,
    pub retry_ceiling: u32,
}

impl DeviceConfig {
    /// Request timeout from §5.
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    /// Total per-retry-cycle timeout from §5.
    pub const DEFAULT_RETRY_CYCLE_TIMEOUT: Duration = Duration::from_secs(120);
    /// Retry ceiling before a transaction is quarantined (§4.7, §4.11).
    pub const DEFAULT_RETRY_CEILING: u32 = 8;

    pub fn new(festival_id: impl Into<String>, device_label: impl Into<String>) -> Self {
        Self {
            festival_id: festival_id.into(),
            device_label: device_label.into(),
            sync_url: String::new(),
            auth_url: String::new(),
            require_signing_key: false,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            retry_cycle_timeout: Self::DEFAULT_RETRY_CYCLE_TIMEOUT,
            retry_ceiling: Self::DEFAULT_RETRY_CEILING,
        }
    }

    /// Reads the persisted config, or lazily creates and persists a default
    /// one if none exists yet.
    pub fn load_or_init(
        storage: &impl Storage,
        festival_id: impl Into<String>,
        device_label: impl Into<String>,
    ) -> Result<Self> {
        if let Some(bytes) = storage
            .read_opt(STORAGE_KEY)
            .map_err(|e| crate::error::OfflineCoreError::StorageError(e.to_string()))?
        {
            let config = serde_json::from_slice(&bytes)
                .map_err(|e| crate::error::OfflineCoreError::LedgerCorrupt(e.to_string()))?;
            return Ok(config);
        }
        let config = Self::new(festival_id, device_label);
        config.persist(storage)?;
        Ok(config)
    }

    pub fn persist(&self, storage: &impl Storage) -> Result<()> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| crate::error::OfflineCoreError::LedgerCorrupt(e.to_string()))?;
        storage
            .write(STORAGE_KEY, &bytes)
            .map_err(|e| crate::error::OfflineCoreError::StorageError(e.to_string()))
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

/// The `{signingKey, qrVerificationKey, serverTime}` bundle returned at
/// login (§6), plus the locally-observed clock-skew warning.
pub struct SessionMaterial {
    pub signing_key: Secret<[u8; 32]>,
    pub qr_verification_key: Secret<[u8; 32]>,
    pub server_time: offline_wire::TimestampMillis,
    /// `true` iff `|serverTime - now()| > 5 minutes` (§6).
    pub clock_skew_warning: bool,
}

/// Clock-skew threshold from §6: more than 5 minutes of drift is a warning.
pub const CLOCK_SKEW_WARNING_THRESHOLD_MILLIS: i64 = 5 * 60 * 1000;

impl SessionMaterial {
    pub fn new(
        signing_key: Secret<[u8; 32]>,
        qr_verification_key: Secret<[u8; 32]>,
        server_time: offline_wire::TimestampMillis,
        now: offline_wire::TimestampMillis,
    ) -> Self {
        let skew = (server_time.as_i64() - now.as_i64()).abs();
        Self {
            signing_key,
            qr_verification_key,
            server_time,
            clock_skew_warning: skew > CLOCK_SKEW_WARNING_THRESHOLD_MILLIS,
        }
    }
}
