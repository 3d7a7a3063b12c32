// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::error::{FxError, FxResult};
use crate::models::{CachedRates, CurrencyCode, RateTable};

/// Anything that can produce a fresh rate table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateSource: Send + Sync {
    /// One attempt, no retry. Every failure is reported as `FetchFailure`.
    async fn fetch_rates(&self) -> FxResult<CachedRates>;
}

/// Wire shape of `GET /fx/rates`.
#[derive(Debug, Deserialize)]
pub struct RatesPayload {
    pub base: String,
    pub rates: HashMap<String, f64>,
    #[serde(alias = "fetched_at")]
    pub timestamp: Option<String>,
}

impl RatesPayload {
    /// Check the payload and turn it into a complete table.
    ///
    /// `now` stands in for the timestamp when the server does not send one.
    pub fn validate(self, now: DateTime<Utc>) -> FxResult<CachedRates> {
        if self.base != CurrencyCode::BASE.as_str() {
            return Err(FxError::FetchFailure(format!(
                "unexpected base currency {}",
                self.base
            )));
        }

        let known = self.rates.iter().filter_map(|(code, rate)| match code.parse::<CurrencyCode>() {
            Ok(code) => Some((code, *rate)),
            Err(_) => {
                debug!(code = %code, "ignoring unsupported currency in rate payload");
                None
            }
        });
        let rates = RateTable::try_from_rates(known).map_err(FxError::FetchFailure)?;

        let fetched_at = match self.timestamp {
            Some(ts) => DateTime::parse_from_rfc3339(&ts)
                .map_err(|e| FxError::FetchFailure(format!("invalid timestamp {:?}: {}", ts, e)))?
                .with_timezone(&Utc),
            None => now,
        };

        Ok(CachedRates::new(rates, fetched_at))
    }
}

#[derive(Clone)]
pub struct FxClient {
    client: Client,
    url: String,
}

impl FxClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> FxResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FxError::FetchFailure(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RateSource for FxClient {
    async fn fetch_rates(&self) -> FxResult<CachedRates> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FxError::FetchFailure(format!("request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| FxError::FetchFailure(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(FxError::FetchFailure(format!("HTTP {}", status)));
        }

        let payload: RatesPayload = serde_json::from_str(&text)
            .map_err(|e| FxError::FetchFailure(format!("malformed payload: {}", e)))?;

        payload.validate(Utc::now())
    }
}
