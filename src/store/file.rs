// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::warn;

use super::KeyValueStore;
use crate::error::{FxError, FxResult};

/// All keys in a single JSON object on disk.
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file contents, `None` when the file does not exist yet.
    async fn read_bytes(&self) -> FxResult<Option<Vec<u8>>> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FxError::CacheReadFailure(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn parse(&self, bytes: &[u8]) -> FxResult<BTreeMap<String, String>> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(bytes).map_err(|e| {
            FxError::CacheReadFailure(format!("{}: {}", self.path.display(), e))
        })
    }

    async fn read_all(&self) -> FxResult<BTreeMap<String, String>> {
        match self.read_bytes().await? {
            Some(bytes) => self.parse(&bytes),
            None => Ok(BTreeMap::new()),
        }
    }

    async fn write_all(&self, entries: &BTreeMap<String, String>) -> FxResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let text = serde_json::to_string_pretty(entries)
            .map_err(|e| FxError::Storage(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Entries for a write. Unparseable contents are replaced; a file that
    /// cannot be read at all fails the write so other keys survive.
    async fn entries_for_write(&self) -> FxResult<BTreeMap<String, String>> {
        let Some(bytes) = self.read_bytes().await? else {
            return Ok(BTreeMap::new());
        };
        match self.parse(&bytes) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(error = %e, "replacing corrupt store file");
                Ok(BTreeMap::new())
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> FxResult<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> FxResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.entries_for_write().await?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries).await
    }

    async fn remove(&self, key: &str) -> FxResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.entries_for_write().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_persists_across_instances() -> FxResult<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("store.json");

        let store = FileStore::new(&path);
        assert_eq!(store.get("linea-currency").await?, None);
        store.set("linea-currency", "GBP").await?;
        store.set("linea-fx-timestamp", "2025-01-24T10:00:00Z").await?;

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("linea-currency").await?.as_deref(), Some("GBP"));

        reopened.remove("linea-currency").await?;
        assert_eq!(store.get("linea-currency").await?, None);
        assert!(store.get("linea-fx-timestamp").await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_read_failure() -> FxResult<()> {
        let dir = tempdir()?;
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json")?;

        let store = FileStore::new(&path);
        assert!(matches!(
            store.get("linea-currency").await,
            Err(FxError::CacheReadFailure(_))
        ));

        // Writing recovers the file
        store.set("linea-currency", "EUR").await?;
        assert_eq!(store.get("linea-currency").await?.as_deref(), Some("EUR"));

        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_treated_as_corrupt() -> FxResult<()> {
        let dir = tempdir()?;
        let path = dir.path().join("store.json");
        std::fs::write(&path, [0xff, 0xfe, 0xfd])?;

        let store = FileStore::new(&path);
        assert!(matches!(
            store.get("linea-currency").await,
            Err(FxError::CacheReadFailure(_))
        ));
        store.set("linea-currency", "JPY").await?;
        assert_eq!(store.get("linea-currency").await?.as_deref(), Some("JPY"));

        Ok(())
    }

    #[tokio::test]
    async fn test_unreadable_file_fails_writes_without_touching_it() -> FxResult<()> {
        let dir = tempdir()?;
        // A directory where the file should be cannot be read as one
        let path = dir.path().join("store.json");
        std::fs::create_dir(&path)?;
        std::fs::write(path.join("keep"), "other data")?;

        let store = FileStore::new(&path);
        assert!(matches!(
            store.set("linea-currency", "EUR").await,
            Err(FxError::CacheReadFailure(_))
        ));
        assert!(matches!(
            store.remove("linea-currency").await,
            Err(FxError::CacheReadFailure(_))
        ));

        // Nothing was staged for a replacing rename
        assert!(!dir.path().join("store.json.tmp").exists());
        assert_eq!(std::fs::read_to_string(path.join("keep"))?, "other data");

        Ok(())
    }
}
