//! Key-value storage backends.
//!
//! The store operates on whole text values under string keys, so backends
//! stay trivially small: an in-memory map for tests and the single-process
//! demo, and a one-file-per-key directory for real use.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use log::debug;
use once_cell::sync::OnceCell;

use super::StoreError;

/// Synchronous key-value persistence of text entries.
///
/// An absent key reads back as `None`, never as an error.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Volatile in-memory storage.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

static DATA_DIR_OVERRIDE: OnceCell<PathBuf> = OnceCell::new();

/// Override the directory used by [`FileStorage::new_default`].
///
/// Must be called before the first store is opened; later calls are ignored.
pub fn set_data_dir_override(path: PathBuf) {
    let _ = DATA_DIR_OVERRIDE.set(path);
}

/// File-backed storage: one text file per key under a data directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open storage rooted at an explicit directory, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(FileStorage { dir })
    }

    /// Open storage at the override directory if one was set, otherwise at
    /// the platform data directory.
    pub fn new_default() -> Result<Self, StoreError> {
        let dir = match DATA_DIR_OVERRIDE.get() {
            Some(dir) => dir.clone(),
            None => {
                let mut dir = dirs::data_dir().ok_or_else(|| {
                    StoreError::Backend("could not determine data directory".to_string())
                })?;
                dir.push("chalkcast");
                dir
            }
        };
        debug!("Opening file storage at {}", dir.display());
        Self::new(dir)
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::write(self.entry_path(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
