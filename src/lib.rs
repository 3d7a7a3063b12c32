// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

//! Multi-currency display for the storefront: exchange-rate fetching,
//! a persistent stale-while-revalidate cache, and the currency context that
//! converts and formats base-currency prices.

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod exchange_rates;
pub mod models;
pub mod store;
pub mod supervisor;
pub mod utils;

pub use api::{FxClient, RateSource};
pub use cache::RateCache;
pub use context::{CurrencyContext, CurrencyState, InitOptions};
pub use error::{FxError, FxResult};
pub use models::{CachedRates, CurrencyCode, RateTable};
pub use supervisor::Supervisor;
