// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

//! The currency context: selected currency, rate table and the derived
//! `convert`/`format` operations every price display goes through.
//!
//! The context is an explicit handle, cloned into whatever needs prices. One
//! owner constructs it with [`CurrencyContext::initialize`] and drives
//! background refreshes with a [`crate::supervisor::Supervisor`].

use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::api::RateSource;
use crate::cache::RateCache;
use crate::error::{FxError, FxResult};
use crate::models::{is_stale, supported_currencies, CachedRates, CurrencyCode, CurrencyInfo, RateTable};
use crate::utils::format_money;

/// Everything a price display needs, copied out of the context.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyState {
    pub currency: CurrencyCode,
    pub rates: RateTable,
    pub fetched_at: Option<DateTime<Utc>>,
    pub stale: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Code asked for explicitly (query parameter, CLI flag). Wins over the
    /// persisted preference when supported.
    pub requested_currency: Option<String>,
    pub locale: Option<String>,
    pub ttl: Option<Duration>,
}

pub const DEFAULT_TTL_HOURS: i64 = 6;

/// Pick the starting currency.
///
/// An unsupported requested code resolves to the base currency and is handed
/// back as a notice for the caller to surface.
pub fn resolve_initial_currency(
    requested: Option<&str>,
    persisted: Option<&str>,
    locale: Option<&str>,
) -> (CurrencyCode, Option<FxError>) {
    if let Some(requested) = requested.map(str::trim).filter(|s| !s.is_empty()) {
        return match requested.parse::<CurrencyCode>() {
            Ok(code) => (code, None),
            Err(e) => {
                warn!(requested, "unsupported currency requested, using {}", CurrencyCode::BASE);
                (CurrencyCode::BASE, Some(e))
            }
        };
    }

    if let Some(persisted) = persisted {
        match persisted.parse::<CurrencyCode>() {
            Ok(code) => return (code, None),
            Err(_) => debug!(persisted, "ignoring unsupported persisted currency"),
        }
    }

    let detected = locale.and_then(CurrencyCode::from_locale);
    (detected.unwrap_or(CurrencyCode::BASE), None)
}

#[derive(Clone)]
pub struct CurrencyContext {
    inner: Arc<Inner>,
}

struct Inner {
    state: RwLock<CurrencyState>,
    source: Arc<dyn RateSource>,
    cache: RateCache,
    ttl: Duration,
    refreshing: AtomicBool,
    notice: Option<FxError>,
}

/// Clears the in-flight flag however the refresh ends.
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl CurrencyContext {
    /// Build the context from persisted state without touching the network.
    ///
    /// Fresh cached rates are used as-is. Otherwise the expired table (or
    /// identity rates when nothing is cached) is served with `stale` set, and
    /// [`needs_refresh`](Self::needs_refresh) reports that a fetch is due.
    pub async fn initialize(
        source: Arc<dyn RateSource>,
        cache: RateCache,
        options: InitOptions,
    ) -> Self {
        let ttl = options.ttl.unwrap_or_else(|| Duration::hours(DEFAULT_TTL_HOURS));
        let persisted = cache.load_currency().await;
        let (currency, notice) = resolve_initial_currency(
            options.requested_currency.as_deref(),
            persisted.as_deref(),
            options.locale.as_deref(),
        );

        let now = Utc::now();
        let state = match cache.load().await {
            Some(cached) if !cached.is_stale(now, ttl) => {
                debug!(fetched_at = %cached.fetched_at, "using cached rates");
                CurrencyState {
                    currency,
                    rates: cached.rates,
                    fetched_at: Some(cached.fetched_at),
                    stale: false,
                }
            }
            Some(cached) => {
                debug!(fetched_at = %cached.fetched_at, "cached rates expired, serving until refreshed");
                CurrencyState {
                    currency,
                    rates: cached.rates,
                    fetched_at: Some(cached.fetched_at),
                    stale: true,
                }
            }
            None => CurrencyState {
                currency,
                rates: RateTable::identity(),
                fetched_at: None,
                stale: true,
            },
        };

        info!(currency = %state.currency, stale = state.stale, "currency context ready");

        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(state),
                source,
                cache,
                ttl,
                refreshing: AtomicBool::new(false),
                notice,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CurrencyState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CurrencyState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn currency(&self) -> CurrencyCode {
        self.read().currency
    }

    pub fn rates(&self) -> RateTable {
        self.read().rates.clone()
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.read().fetched_at
    }

    pub fn is_stale(&self) -> bool {
        self.read().stale
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    pub fn snapshot(&self) -> CurrencyState {
        self.read().clone()
    }

    /// Set when initialization had to correct an unsupported requested code.
    pub fn notice(&self) -> Option<&FxError> {
        self.inner.notice.as_ref()
    }

    pub fn supported_currencies(&self) -> Vec<CurrencyInfo> {
        supported_currencies()
    }

    /// True when the current table is not a fresh fetch.
    pub fn needs_refresh(&self) -> bool {
        self.read().stale
    }

    /// Switch the display currency. Returns `false` if it was already active.
    ///
    /// Rates are per base currency, so switching never fetches.
    pub async fn set_currency(&self, code: CurrencyCode) -> bool {
        {
            let mut state = self.write();
            if state.currency == code {
                return false;
            }
            state.currency = code;
        }
        info!(currency = %code, "currency changed");
        self.inner.cache.save_currency(code).await;
        true
    }

    pub async fn set_currency_str(&self, code: &str) -> FxResult<bool> {
        let code = code.parse::<CurrencyCode>()?;
        Ok(self.set_currency(code).await)
    }

    /// Amount in base currency to the selected currency.
    pub fn convert(&self, amount: f64) -> f64 {
        let state = self.read();
        amount * state.rates.get(state.currency)
    }

    pub fn convert_to(&self, amount: f64, target: CurrencyCode) -> f64 {
        amount * self.read().rates.get(target)
    }

    /// Convert, then render with the fixed display locale.
    pub fn format(&self, amount: f64) -> String {
        let (currency, rate) = {
            let state = self.read();
            (state.currency, state.rates.get(state.currency))
        };
        format_money(amount * rate, currency)
    }

    pub fn format_as(&self, amount: f64, target: CurrencyCode) -> String {
        format_money(self.convert_to(amount, target), target)
    }

    /// Fetch rates now. On success the table is committed and persisted; on
    /// failure the current table stays and is marked stale.
    ///
    /// Returns `Ok(false)` without fetching when another refresh is in flight.
    pub async fn refresh(&self) -> FxResult<bool> {
        if self
            .inner
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("refresh already in flight");
            return Ok(false);
        }
        let _guard = RefreshGuard(&self.inner.refreshing);

        match self.inner.source.fetch_rates().await {
            Ok(cached) => {
                self.commit(&cached);
                self.inner.cache.save(&cached).await;
                info!(fetched_at = %cached.fetched_at, "exchange rates refreshed");
                Ok(true)
            }
            Err(e) => {
                self.write().stale = true;
                warn!(error = %e, "exchange rate refresh failed, keeping current rates");
                Err(e)
            }
        }
    }

    fn commit(&self, cached: &CachedRates) {
        let mut state = self.write();
        state.rates = cached.rates.clone();
        state.fetched_at = Some(cached.fetched_at);
        state.stale = false;
    }

    /// One staleness check. Marks the table stale once it is older than the
    /// TTL and issues a single refetch.
    ///
    /// Returns whether a refetch was attempted.
    pub async fn check_staleness(&self, now: DateTime<Utc>) -> bool {
        let expired = {
            let mut state = self.write();
            let expired = is_stale(state.fetched_at, now, self.inner.ttl);
            if expired {
                state.stale = true;
            }
            expired
        };
        if !expired {
            return false;
        }

        debug!("rates past TTL, refetching");
        // Failures are already logged and leave the stale table in place
        self.refresh().await.unwrap_or(true)
    }
}

#[cfg(test)]
#[path = "context_test.rs"]
mod context_test;
