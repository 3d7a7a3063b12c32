// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};

use super::currencies::CurrencyCode;

/// Multipliers from one base unit into every supported currency.
///
/// Always complete: a code without a known rate maps to `1.0`, and the base
/// currency is always exactly `1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable(BTreeMap<CurrencyCode, f64>);

impl RateTable {
    /// Table where every currency converts 1:1 with the base.
    pub fn identity() -> Self {
        Self(CurrencyCode::ALL.iter().map(|c| (*c, 1.0)).collect())
    }

    /// Build a table from known rates, filling the gaps with `1.0`.
    pub fn from_rates<I>(rates: I) -> Self
    where
        I: IntoIterator<Item = (CurrencyCode, f64)>,
    {
        let mut table = Self::identity();
        for (code, rate) in rates {
            if code != CurrencyCode::BASE {
                table.0.insert(code, rate);
            }
        }
        table
    }

    /// Like [`from_rates`](Self::from_rates), but every given rate must be
    /// finite and positive. The error names the offending entry.
    pub fn try_from_rates<I>(rates: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (CurrencyCode, f64)>,
    {
        let rates: Vec<(CurrencyCode, f64)> = rates.into_iter().collect();
        if let Some((code, rate)) = rates
            .iter()
            .find(|(_, rate)| !rate.is_finite() || *rate <= 0.0)
        {
            return Err(format!("invalid rate {} for {}", rate, code));
        }
        Ok(Self::from_rates(rates))
    }

    /// Build a validated table from string-keyed rates, ignoring unsupported codes.
    pub fn try_from_raw(raw: &HashMap<String, f64>) -> Result<Self, String> {
        Self::try_from_rates(
            raw.iter()
                .filter_map(|(code, rate)| code.parse::<CurrencyCode>().ok().map(|c| (c, *rate))),
        )
    }

    /// Rate for `code`; never fails.
    pub fn get(&self, code: CurrencyCode) -> f64 {
        self.0.get(&code).copied().unwrap_or(1.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CurrencyCode, f64)> + '_ {
        self.0.iter().map(|(code, rate)| (*code, *rate))
    }

    /// String-keyed copy, the shape persisted in the cache.
    pub fn to_raw(&self) -> BTreeMap<String, f64> {
        self.iter()
            .map(|(code, rate)| (code.as_str().to_string(), rate))
            .collect()
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::identity()
    }
}

/// A rate table together with when it was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRates {
    pub rates: RateTable,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRates {
    pub fn new(rates: RateTable, fetched_at: DateTime<Utc>) -> Self {
        Self { rates, fetched_at }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }

    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        is_stale(Some(self.fetched_at), now, ttl)
    }
}

/// An entry is stale once its age exceeds the TTL. Never fetched counts as stale.
pub fn is_stale(fetched_at: Option<DateTime<Utc>>, now: DateTime<Utc>, ttl: Duration) -> bool {
    match fetched_at {
        Some(fetched_at) => now - fetched_at > ttl,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_covers_every_currency() {
        let table = RateTable::identity();
        for code in CurrencyCode::ALL {
            assert_eq!(table.get(code), 1.0);
        }
    }

    #[test]
    fn test_missing_rates_default_to_one() {
        let table = RateTable::from_rates([(CurrencyCode::GBP, 0.79), (CurrencyCode::JPY, 149.5)]);
        assert_relative_eq!(table.get(CurrencyCode::GBP), 0.79);
        assert_relative_eq!(table.get(CurrencyCode::JPY), 149.5);
        assert_eq!(table.get(CurrencyCode::EUR), 1.0);
        assert_eq!(table.get(CurrencyCode::MXN), 1.0);
        assert_eq!(table.iter().count(), CurrencyCode::ALL.len());
    }

    #[test]
    fn test_base_rate_is_pinned() {
        let table = RateTable::from_rates([(CurrencyCode::USD, 2.0)]);
        assert_eq!(table.get(CurrencyCode::USD), 1.0);
    }

    #[test]
    fn test_from_raw_ignores_unknown_codes() {
        let mut raw = HashMap::new();
        raw.insert("EUR".to_string(), 0.92);
        raw.insert("CAD".to_string(), 1.36);
        let table = RateTable::try_from_raw(&raw).unwrap();
        assert_relative_eq!(table.get(CurrencyCode::EUR), 0.92);
        assert!(!table.to_raw().contains_key("CAD"));
    }

    #[test]
    fn test_rejects_non_positive_or_non_finite_rates() {
        assert!(RateTable::try_from_rates([(CurrencyCode::GBP, -0.79)]).is_err());
        assert!(RateTable::try_from_rates([(CurrencyCode::JPY, 0.0)]).is_err());
        assert!(RateTable::try_from_rates([(CurrencyCode::EUR, f64::NAN)]).is_err());
        assert!(RateTable::try_from_rates([(CurrencyCode::MXN, f64::INFINITY)]).is_err());

        let err = RateTable::try_from_rates([(CurrencyCode::EUR, 0.92), (CurrencyCode::JPY, 0.0)])
            .unwrap_err();
        assert!(err.contains("JPY"), "{}", err);

        // Unsupported codes are dropped before validation
        let mut raw = HashMap::new();
        raw.insert("CAD".to_string(), -1.0);
        raw.insert("GBP".to_string(), 0.79);
        assert!(RateTable::try_from_raw(&raw).is_ok());
    }

    #[test]
    fn test_staleness_boundary() {
        let ttl = Duration::hours(6);
        let now = Utc::now();

        let fresh = CachedRates::new(RateTable::identity(), now - ttl + Duration::milliseconds(1));
        assert!(!fresh.is_stale(now, ttl));

        let expired = CachedRates::new(RateTable::identity(), now - ttl - Duration::milliseconds(1));
        assert!(expired.is_stale(now, ttl));

        assert!(is_stale(None, now, ttl));
    }
}
