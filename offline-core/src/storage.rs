//! Durable-storage abstraction (§4.12).
//!
//! Every stateful component (`WalletCache`, `QRCache`, `DuplicateGuard`,
//! `OfflineLedger`) is generic over a `Storage` capability rather than doing
//! file I/O directly, so that production code can bind to a real directory
//! on disk while tests bind to an in-memory fake. Modeled on the teacher's
//! flat-file-system trait: one flat namespace of `key -> bytes`, no subdirs.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Abstraction over a flat key/value durable store.
///
/// Use [`io::ErrorKind::NotFound`] to detect a missing key from [`Self::read`].
pub trait Storage: Send + Sync {
    fn read(&self, key: &str) -> io::Result<Vec<u8>>;
    fn write(&self, key: &str, data: &[u8]) -> io::Result<()>;
    fn delete(&self, key: &str) -> io::Result<()>;

    /// Like [`Self::read`], but returns `Ok(None)` instead of a `NotFound`
    /// error. Convenience wrapper most callers want.
    fn read_opt(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        match self.read(key) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Durable [`Storage`] backed by one file per key in a base directory.
///
/// Writes are atomic: the data is first written to a temp file inside
/// `{base_dir}/.write`, then renamed into place, so a crash mid-write never
/// leaves a half-written key.
pub struct FileStorage {
    base_dir: PathBuf,
    write_dir: PathBuf,
}

impl FileStorage {
    pub fn create_dir_all(base_dir: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&base_dir)?;
        let write_dir = base_dir.join(".write");
        remove_dir_all_idempotent(&write_dir)?;
        fs::create_dir(&write_dir)?;
        Ok(Self { base_dir, write_dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(key)
    }
}

fn remove_dir_all_idempotent(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> io::Result<Vec<u8>> {
        fs::read(self.path_for(key))
    }

    fn write(&self, key: &str, data: &[u8]) -> io::Result<()> {
        // Random-ish temp filename so concurrent writers to different keys
        // never collide; a single key's writes are already serialized by
        // the caller (the ledger/cache mutex).
        let tmp_name = format!("{key}.{}.tmp", std::process::id());
        let tmp_path = self.write_dir.join(tmp_name);
        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, self.path_for(key))
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// An in-memory [`Storage`] fake, used by tests and as the degraded-mode
/// backing store when the OS keychain/filesystem is unavailable.
#[derive(Default)]
pub struct MemStorage {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(key: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no such key: {key}"))
}

impl Storage for MemStorage {
    fn read(&self, key: &str) -> io::Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| not_found(key))
    }

    fn write(&self, key: &str, data: &[u8]) -> io::Result<()> {
        self.files.lock().unwrap().insert(key.to_owned(), data.to_owned());
        Ok(())
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        self.files.lock().unwrap().remove(key);
        Ok(())
    }
}

impl<T: Storage + ?Sized> Storage for std::sync::Arc<T> {
    fn read(&self, key: &str) -> io::Result<Vec<u8>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, data: &[u8]) -> io::Result<()> {
        (**self).write(key, data)
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        (**self).delete(key)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn exercise(storage: &impl Storage) {
        assert!(matches!(
            storage.read_opt("missing").unwrap(),
            None
        ));
        storage.write("k", b"v1").unwrap();
        assert_eq!(storage.read("k").unwrap(), b"v1");
        storage.write("k", b"v2").unwrap();
        assert_eq!(storage.read("k").unwrap(), b"v2");
        storage.delete("k").unwrap();
        assert!(storage.read_opt("k").unwrap().is_none());
    }

    #[test]
    fn mem_storage_round_trips() {
        exercise(&MemStorage::new());
    }

    #[test]
    fn file_storage_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::create_dir_all(dir.path().to_owned()).unwrap();
        exercise(&storage);
    }

    #[test]
    fn file_storage_write_is_atomic_rename() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::create_dir_all(dir.path().to_owned()).unwrap();
        storage.write("ledger", b"{}").unwrap();
        // no leftover temp files after a successful write
        let leftovers: Vec<_> = fs::read_dir(dir.path().join(".write"))
            .unwrap()
            .collect();
        assert!(leftovers.is_empty());
    }
}
