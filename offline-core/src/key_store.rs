//! Scoped custody of device/session key material (§4.2, C2).

use std::sync::Mutex;

use secrecy::{ExposeSecret, Secret};

use crate::crypto;
use crate::error::{OfflineCoreError, Result};
use crate::secret_storage::SecretStorage;

pub const DEVICE_SECRET_KEY: &str = "device_secret_key";
pub const OFFLINE_SIGNING_KEY: &str = "offline_signing_key";
pub const QR_VERIFICATION_KEY: &str = "qr_verification_key";

/// Custody of `DeviceSecret`, `SigningKey`, and `QRVerificationKey`.
///
/// All persistence goes through [`SecretStorage`]; callers never see raw
/// bytes outside a `Secret` wrapper. `getOrCreateDeviceSecret` is guarded by
/// a mutex so concurrent first-callers agree on one generated value instead
/// of racing to write two different secrets.
pub struct SecureKeyStore<S: SecretStorage> {
    storage: S,
    create_lock: Mutex<()>,
}

impl<S: SecretStorage> SecureKeyStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage, create_lock: Mutex::new(()) }
    }

    /// Idempotent: the first call generates and persists 32 random bytes;
    /// every call thereafter (including concurrent ones) observes that same
    /// value.
    pub fn get_or_create_device_secret(&self) -> Result<Secret<[u8; 32]>> {
        let _guard = self.create_lock.lock().unwrap();
        if let Some(existing) = self.get(DEVICE_SECRET_KEY)? {
            return Ok(Secret::new(existing));
        }
        let fresh = crypto::random_key()?;
        self.set(DEVICE_SECRET_KEY, &Secret::new(fresh))?;
        Ok(Secret::new(fresh))
    }

    /// `hex(sha256(deviceSecret))[0..16]`, stable across sessions.
    pub fn device_identifier(&self) -> Result<String> {
        let secret = self.get_or_create_device_secret()?;
        let digest = crypto::sha256_hex(secret.expose_secret());
        Ok(digest[..16].to_owned())
    }

    pub fn set_signing_key(&self, key: [u8; 32]) -> Result<()> {
        self.set(OFFLINE_SIGNING_KEY, &Secret::new(key))
    }

    pub fn get_signing_key(&self) -> Result<Option<Secret<[u8; 32]>>> {
        Ok(self.get(OFFLINE_SIGNING_KEY)?.map(Secret::new))
    }

    pub fn clear_signing_key(&self) -> Result<()> {
        self.clear(OFFLINE_SIGNING_KEY)
    }

    pub fn set_qr_verification_key(&self, key: [u8; 32]) -> Result<()> {
        self.set(QR_VERIFICATION_KEY, &Secret::new(key))
    }

    pub fn get_qr_verification_key(&self) -> Result<Option<Secret<[u8; 32]>>> {
        Ok(self.get(QR_VERIFICATION_KEY)?.map(Secret::new))
    }

    pub fn clear_qr_verification_key(&self) -> Result<()> {
        self.clear(QR_VERIFICATION_KEY)
    }

    /// Converts a `SecretStorage` I/O failure (OS keychain domain, §4.2) into
    /// `KeyStoreError`, distinct from the ordinary-storage `StorageError`
    /// plain [`crate::storage::Storage`]-backed components use.
    fn get(&self, name: &str) -> Result<Option<[u8; 32]>> {
        self.storage.get(name).map_err(|e| OfflineCoreError::KeyStoreError(e.to_string()))
    }

    fn set(&self, name: &str, secret: &Secret<[u8; 32]>) -> Result<()> {
        self.storage.set(name, secret).map_err(|e| OfflineCoreError::KeyStoreError(e.to_string()))
    }

    fn clear(&self, name: &str) -> Result<()> {
        self.storage.clear(name).map_err(|e| OfflineCoreError::KeyStoreError(e.to_string()))
    }

    /// Erases signing + QR keys; does **not** erase the device secret
    /// (§4.2).
    pub fn clear_session_keys(&self) -> Result<()> {
        self.clear_signing_key()?;
        self.clear_qr_verification_key()
    }

    /// Resolves the key that should sign a new payment intent: `SigningKey`
    /// if present, else `DeviceSecret`, else `NoSigningKey` if
    /// `require_signing_key` is set (Open Question 1, §9).
    pub fn resolve_signing_key(&self, require_signing_key: bool) -> Result<Secret<[u8; 32]>> {
        if let Some(k) = self.get_signing_key()? {
            return Ok(k);
        }
        if require_signing_key {
            return Err(OfflineCoreError::NoSigningKey);
        }
        self.get_or_create_device_secret()
    }
}
