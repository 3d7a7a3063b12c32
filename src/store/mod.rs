// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

//! Durable string-keyed storage for the currency preference and rate cache.

mod file;
mod sqlite;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{FxError, FxResult};

pub use file::FileStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> FxResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> FxResult<()>;
    async fn remove(&self, key: &str) -> FxResult<()>;
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> FxResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| FxError::CacheReadFailure(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> FxResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| FxError::Storage(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> FxResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| FxError::Storage(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}
