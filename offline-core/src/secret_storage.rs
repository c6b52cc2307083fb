//! Secret custody (§4.2, §6).
//!
//! Secrets never go through the ordinary [`crate::storage::Storage`]
//! abstraction — they go through `SecretStorage`, which production binds to
//! the OS keychain (via the `keyring` crate, same as the teacher's own
//! `SecretStore`) and tests bind to an in-memory fake.

use std::io;

use offline_wire::hex;
use secrecy::{ExposeSecret, Secret};

/// Abstraction over OS-level secure secret custody.
///
/// Every method is keyed by a small fixed vocabulary of names (see the
/// `device_secret_key` / `offline_signing_key` / `qr_verification_key`
/// constants in [`crate::key_store`]) rather than an open string, but the
/// trait itself stays generic so it can be tested without a real keychain.
pub trait SecretStorage: Send + Sync {
    fn get(&self, name: &str) -> io::Result<Option<[u8; 32]>>;
    fn set(&self, name: &str, secret: &Secret<[u8; 32]>) -> io::Result<()>;
    fn clear(&self, name: &str) -> io::Result<()>;
}

/// Production [`SecretStorage`] backed by the OS keychain via `keyring`.
#[cfg(feature = "keychain")]
pub struct KeyringSecretStorage {
    service: String,
}

#[cfg(feature = "keychain")]
impl KeyringSecretStorage {
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }

    fn entry(&self, name: &str) -> io::Result<keyring::Entry> {
        keyring::Entry::new(&self.service, name)
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

#[cfg(feature = "keychain")]
impl SecretStorage for KeyringSecretStorage {
    fn get(&self, name: &str) -> io::Result<Option<[u8; 32]>> {
        match self.entry(name)?.get_password() {
            Ok(hex_str) => {
                let mut out = [0u8; 32];
                hex::decode_to_slice(&hex_str, &mut out)
                    .map_err(|e| io::Error::other(e.to_string()))?;
                Ok(Some(out))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(io::Error::other(e.to_string())),
        }
    }

    fn set(&self, name: &str, secret: &Secret<[u8; 32]>) -> io::Result<()> {
        let hex_str = hex::encode(secret.expose_secret());
        self.entry(name)?
            .set_password(&hex_str)
            .map_err(|e| io::Error::other(e.to_string()))
    }

    fn clear(&self, name: &str) -> io::Result<()> {
        match self.entry(name)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(io::Error::other(e.to_string())),
        }
    }
}

/// An in-memory [`SecretStorage`] fake for tests and CI (no GUI keyring
/// available in headless environments).
#[derive(Default)]
pub struct MemSecretStorage {
    inner: std::sync::Mutex<std::collections::BTreeMap<String, [u8; 32]>>,
}

impl MemSecretStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStorage for MemSecretStorage {
    fn get(&self, name: &str) -> io::Result<Option<[u8; 32]>> {
        Ok(self.inner.lock().unwrap().get(name).copied())
    }

    fn set(&self, name: &str, secret: &Secret<[u8; 32]>) -> io::Result<()> {
        self.inner
            .lock()
            .unwrap()
            .insert(name.to_owned(), *secret.expose_secret());
        Ok(())
    }

    fn clear(&self, name: &str) -> io::Result<()> {
        self.inner.lock().unwrap().remove(name);
        Ok(())
    }
}
