//! Device-local key/value storage.
//!
//! Only two keys exist: the cart snapshot and the interface language. Values
//! are unversioned JSON strings.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

/// Errors from local storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("local storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage is not writable.
    #[error("local storage unavailable: {0}")]
    Unavailable(String),
}

/// Keys of the local storage slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// Serialized cart lines.
    Cart,
    /// Interface language.
    Language,
}

impl StorageKey {
    /// Key name on disk.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Language => "language",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronous key/value storage on the device.
pub trait LocalStorage: Send + Sync {
    /// Stored value, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the slot cannot be read.
    fn get(&self, key: StorageKey) -> Result<Option<String>, StorageError>;

    /// Overwrite a slot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the slot cannot be written.
    fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError>;

    /// Erase a slot. Erasing an empty slot succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the slot cannot be erased.
    fn remove(&self, key: StorageKey) -> Result<(), StorageError>;
}

/// One JSON file per key under a data directory.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so a crash never leaves a half-written slot.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The data directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: StorageKey) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl LocalStorage for FileStorage {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        let mut file = tempfile::NamedTempFile::new_in(&self.dir)?;
        file.write_all(value.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(self.path(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-memory storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<StorageKey, String>>,
    read_only: Mutex<bool>,
}

impl MemoryStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-filled with one slot.
    #[must_use]
    pub fn with(key: StorageKey, value: impl Into<String>) -> Self {
        let storage = Self::default();
        storage
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value.into());
        storage
    }

    /// Reject every write, as a full or locked-down device would.
    pub fn set_read_only(&self, read_only: bool) {
        *self.read_only.lock().unwrap_or_else(PoisonError::into_inner) = read_only;
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if *self.read_only.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(StorageError::Unavailable("storage is read-only".to_string()));
        }
        Ok(())
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        Ok(self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned())
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
        self.check_writable()?;
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));

        assert_eq!(storage.get(StorageKey::Cart).unwrap(), None);
        storage.set(StorageKey::Cart, "[]").unwrap();
        storage.set(StorageKey::Language, "\"en\"").unwrap();
        assert_eq!(storage.get(StorageKey::Cart).unwrap().as_deref(), Some("[]"));
        assert!(dir.path().join("nested/language.json").exists());

        storage.remove(StorageKey::Cart).unwrap();
        assert_eq!(storage.get(StorageKey::Cart).unwrap(), None);
        // Removing twice is fine
        storage.remove(StorageKey::Cart).unwrap();
    }

    #[test]
    fn test_file_storage_overwrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.set(StorageKey::Cart, "[1]").unwrap();
        storage.set(StorageKey::Cart, "[2]").unwrap();

        assert_eq!(storage.get(StorageKey::Cart).unwrap().as_deref(), Some("[2]"));
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_memory_storage_read_only() {
        let storage = MemoryStorage::with(StorageKey::Language, "\"fr\"");
        storage.set_read_only(true);
        assert!(storage.set(StorageKey::Language, "\"en\"").is_err());
        assert!(storage.remove(StorageKey::Language).is_err());
        assert_eq!(
            storage.get(StorageKey::Language).unwrap().as_deref(),
            Some("\"fr\"")
        );
    }
}
