//! Scoped persistent key-value store.
//!
//! Each value is a JSON file under the store directory. Reads are tolerant
//! of missing, unreadable, or corrupt entries: they all degrade to `None`
//! so a broken cache file never takes the application down.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct KvStore {
    dir: PathBuf,
}

impl KvStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create store directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Read a value. Missing or corrupt entries return `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.entry_path(key);
        if !path.exists() {
            return None;
        }

        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!(key, error = %e, "Failed to read store entry");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Corrupt store entry, treating as absent");
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.entry_path(key);
        let contents = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize store entry: {}", key))?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write store entry: {}", key))?;
        Ok(())
    }

    /// Remove a value. Removing an absent key is not an error.
    pub fn remove(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove store entry: {}", key))?;
        }
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entry_path(key).exists()
    }
}
