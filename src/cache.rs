// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

//! Typed access to the persisted currency preference and rate table.
//!
//! Reads never fail: anything unreadable is a miss. Writes are best-effort.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{FxError, FxResult};
use crate::models::{CachedRates, CurrencyCode, RateTable};
use crate::store::KeyValueStore;

pub const CURRENCY_KEY: &str = "linea-currency";
pub const RATES_KEY: &str = "linea-fx-rates";
pub const TIMESTAMP_KEY: &str = "linea-fx-timestamp";

#[derive(Clone)]
pub struct RateCache {
    store: Arc<dyn KeyValueStore>,
}

impl RateCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Last saved table and its fetch time, or `None` on any kind of miss.
    pub async fn load(&self) -> Option<CachedRates> {
        match self.try_load().await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable rate cache");
                None
            }
        }
    }

    async fn try_load(&self) -> FxResult<Option<CachedRates>> {
        let (Some(rates), Some(timestamp)) = (
            self.store.get(RATES_KEY).await?,
            self.store.get(TIMESTAMP_KEY).await?,
        ) else {
            debug!("no cached rates");
            return Ok(None);
        };

        let raw: HashMap<String, f64> = serde_json::from_str(&rates)
            .map_err(|e| FxError::CacheReadFailure(format!("rates: {}", e)))?;
        let fetched_at = DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| FxError::CacheReadFailure(format!("timestamp {:?}: {}", timestamp, e)))?
            .with_timezone(&Utc);

        let rates = RateTable::try_from_raw(&raw).map_err(FxError::CacheReadFailure)?;

        Ok(Some(CachedRates::new(rates, fetched_at)))
    }

    pub async fn save(&self, cached: &CachedRates) {
        if let Err(e) = self.try_save(cached).await {
            warn!(error = %e, "failed to persist rates");
        }
    }

    async fn try_save(&self, cached: &CachedRates) -> FxResult<()> {
        let rates = serde_json::to_string(&cached.rates.to_raw())
            .map_err(|e| FxError::Storage(e.to_string()))?;
        // Full precision so a reload compares equal
        let timestamp = cached
            .fetched_at
            .to_rfc3339_opts(SecondsFormat::AutoSi, true);

        self.store.set(RATES_KEY, &rates).await?;
        self.store.set(TIMESTAMP_KEY, &timestamp).await?;
        Ok(())
    }

    /// The raw persisted currency string, unvalidated.
    pub async fn load_currency(&self) -> Option<String> {
        match self.store.get(CURRENCY_KEY).await {
            Ok(code) => code,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable currency preference");
                None
            }
        }
    }

    pub async fn save_currency(&self, code: CurrencyCode) {
        if let Err(e) = self.store.set(CURRENCY_KEY, code.as_str()).await {
            warn!(error = %e, currency = %code, "failed to persist currency preference");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::TimeZone;

    /// A store that is never readable or writable.
    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> FxResult<Option<String>> {
            Err(FxError::CacheReadFailure("storage disabled".into()))
        }
        async fn set(&self, _key: &str, _value: &str) -> FxResult<()> {
            Err(FxError::Storage("storage disabled".into()))
        }
        async fn remove(&self, _key: &str) -> FxResult<()> {
            Err(FxError::Storage("storage disabled".into()))
        }
    }

    fn memory_cache() -> (Arc<MemoryStore>, RateCache) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), RateCache::new(store))
    }

    #[tokio::test]
    async fn test_round_trip_is_exact() {
        let (_, cache) = memory_cache();
        let fetched_at = Utc.timestamp_opt(1_737_712_800, 123_456_789).unwrap();
        let cached = CachedRates::new(
            RateTable::from_rates([
                (CurrencyCode::GBP, 0.79),
                (CurrencyCode::EUR, 0.92),
                (CurrencyCode::AUD, 1.52),
                (CurrencyCode::MXN, 17.05),
                (CurrencyCode::JPY, 149.5),
            ]),
            fetched_at,
        );

        cache.save(&cached).await;
        assert_eq!(cache.load().await, Some(cached));
    }

    #[tokio::test]
    async fn test_missing_or_partial_entry_is_a_miss() {
        let (store, cache) = memory_cache();
        assert_eq!(cache.load().await, None);

        store.set(RATES_KEY, r#"{"USD":1,"GBP":0.8}"#).await.unwrap();
        assert_eq!(cache.load().await, None);
    }

    #[tokio::test]
    async fn test_corrupt_entries_are_a_miss() {
        let (store, cache) = memory_cache();
        store.set(RATES_KEY, "{oops").await.unwrap();
        store.set(TIMESTAMP_KEY, "2025-01-24T10:00:00Z").await.unwrap();
        assert_eq!(cache.load().await, None);

        store.set(RATES_KEY, r#"{"GBP":0.8}"#).await.unwrap();
        store.set(TIMESTAMP_KEY, "last tuesday").await.unwrap();
        assert_eq!(cache.load().await, None);
    }

    #[tokio::test]
    async fn test_non_positive_cached_rates_are_a_miss() {
        let (store, cache) = memory_cache();
        store.set(RATES_KEY, r#"{"GBP":-0.79,"JPY":0}"#).await.unwrap();
        store.set(TIMESTAMP_KEY, &Utc::now().to_rfc3339()).await.unwrap();
        assert_eq!(cache.load().await, None);

        store.set(RATES_KEY, r#"{"GBP":0.79,"JPY":0}"#).await.unwrap();
        assert_eq!(cache.load().await, None);

        store.set(RATES_KEY, r#"{"GBP":0.79,"JPY":149.5}"#).await.unwrap();
        assert!(cache.load().await.is_some());
    }

    #[tokio::test]
    async fn test_cached_rates_written_by_hand_are_completed() {
        let (store, cache) = memory_cache();
        store
            .set(RATES_KEY, r#"{"USD":1,"GBP":0.8,"EUR":0.95,"CAD":1.3}"#)
            .await
            .unwrap();
        store.set(TIMESTAMP_KEY, "2025-01-24T10:00:00.000Z").await.unwrap();

        let cached = cache.load().await.unwrap();
        assert_eq!(cached.rates.get(CurrencyCode::GBP), 0.8);
        assert_eq!(cached.rates.get(CurrencyCode::JPY), 1.0);
    }

    #[tokio::test]
    async fn test_broken_store_is_tolerated() {
        let cache = RateCache::new(Arc::new(BrokenStore));
        assert_eq!(cache.load().await, None);
        assert_eq!(cache.load_currency().await, None);

        // Best-effort writes must not panic or error
        cache.save(&CachedRates::new(RateTable::identity(), Utc::now())).await;
        cache.save_currency(CurrencyCode::EUR).await;
    }

    #[tokio::test]
    async fn test_currency_preference() {
        let (store, cache) = memory_cache();
        cache.save_currency(CurrencyCode::JPY).await;
        assert_eq!(store.get(CURRENCY_KEY).await.unwrap().as_deref(), Some("JPY"));
        assert_eq!(cache.load_currency().await.as_deref(), Some("JPY"));
    }
}
