// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FxError;

/// A currency the storefront can display prices in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CurrencyCode {
    USD,
    GBP,
    EUR,
    AUD,
    MXN,
    JPY,
}

/// Display metadata for a supported currency, used to populate selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CurrencyInfo {
    pub code: CurrencyCode,
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimal_places: u32,
}

impl CurrencyCode {
    /// The currency canonical prices are stored and computed in.
    pub const BASE: CurrencyCode = CurrencyCode::USD;

    /// Every supported currency, in selector order.
    pub const ALL: [CurrencyCode; 6] = [
        CurrencyCode::USD,
        CurrencyCode::GBP,
        CurrencyCode::EUR,
        CurrencyCode::AUD,
        CurrencyCode::MXN,
        CurrencyCode::JPY,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CurrencyCode::USD => "USD",
            CurrencyCode::GBP => "GBP",
            CurrencyCode::EUR => "EUR",
            CurrencyCode::AUD => "AUD",
            CurrencyCode::MXN => "MXN",
            CurrencyCode::JPY => "JPY",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CurrencyCode::USD => "US Dollar",
            CurrencyCode::GBP => "British Pound",
            CurrencyCode::EUR => "Euro",
            CurrencyCode::AUD => "Australian Dollar",
            CurrencyCode::MXN => "Mexican Peso",
            CurrencyCode::JPY => "Japanese Yen",
        }
    }

    /// Symbol as rendered by the fixed en-US display locale.
    pub fn symbol(self) -> &'static str {
        match self {
            CurrencyCode::USD => "$",
            CurrencyCode::GBP => "£",
            CurrencyCode::EUR => "€",
            CurrencyCode::AUD => "A$",
            CurrencyCode::MXN => "MX$",
            CurrencyCode::JPY => "¥",
        }
    }

    /// Number of minor-unit digits shown when formatting.
    pub fn decimal_places(self) -> u32 {
        match self {
            CurrencyCode::JPY => 0,
            _ => 2,
        }
    }

    pub fn info(self) -> CurrencyInfo {
        CurrencyInfo {
            code: self,
            name: self.name(),
            symbol: self.symbol(),
            decimal_places: self.decimal_places(),
        }
    }

    /// Best-effort guess from a locale tag such as `en-GB`, `ja_JP.UTF-8` or `de`.
    ///
    /// Returns `None` when the tag says nothing about a supported currency, so
    /// callers can fall through to the base currency.
    pub fn from_locale(locale: &str) -> Option<CurrencyCode> {
        let tag = locale
            .split('.')
            .next()
            .unwrap_or_default()
            .trim()
            .replace('_', "-")
            .to_ascii_lowercase();
        if tag.is_empty() {
            return None;
        }

        let mut parts = tag.split('-');
        let language = parts.next().unwrap_or_default();
        let region = parts.next();

        match (language, region) {
            ("en", Some("gb" | "uk")) => Some(CurrencyCode::GBP),
            ("en", Some("au")) => Some(CurrencyCode::AUD),
            ("en", Some("ie")) => Some(CurrencyCode::EUR),
            ("es", Some("mx")) => Some(CurrencyCode::MXN),
            ("ja", _) => Some(CurrencyCode::JPY),
            ("de" | "fr" | "it" | "nl" | "es" | "pt" | "fi", Some("ch" | "br" | "ca" | "us")) => None,
            ("de" | "fr" | "it" | "nl" | "es" | "pt" | "fi", _) => Some(CurrencyCode::EUR),
            _ => None,
        }
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        CurrencyCode::BASE
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyCode {
    type Err = FxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        CurrencyCode::ALL
            .into_iter()
            .find(|c| c.as_str() == code)
            .ok_or_else(|| FxError::UnsupportedCurrencyRequested(code.to_string()))
    }
}

/// All supported currencies with their display metadata.
pub fn supported_currencies() -> Vec<CurrencyInfo> {
    CurrencyCode::ALL.iter().map(|c| c.info()).collect()
}
