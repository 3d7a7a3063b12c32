// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "storefront-fx.toml";

/// Ten years.
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;
/// One year.
pub const MAX_CHECK_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Full URL of the rates endpoint.
    pub rates_url: String,
    /// Age after which cached rates are stale.
    pub ttl_secs: u64,
    /// How often the supervisor re-checks staleness.
    pub check_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub store: StoreBackend,
    /// File path for the `file` store, database URL for `sqlite`.
    pub store_path: String,
    /// Locale used to guess a first currency, e.g. `en-GB`.
    pub locale: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rates_url: "http://localhost:8000/fx/rates".to_string(),
            ttl_secs: 6 * 60 * 60,
            check_interval_secs: 60,
            request_timeout_secs: 10,
            store: StoreBackend::File,
            store_path: "storefront-fx.json".to_string(),
            locale: None,
        }
    }
}

impl Config {
    /// Clamped to [`MAX_TTL_SECS`] even when `validate` was skipped.
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_secs.min(MAX_TTL_SECS) as i64)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.min(MAX_CHECK_INTERVAL_SECS))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Read the config file (explicit path, else `storefront-fx.toml` if
    /// present, else defaults) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => load_config(path)?,
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    load_config(&default_path)?
                } else {
                    Config::default()
                }
            }
        };
        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `FX_*` overrides; `lookup` is `std::env::var` outside tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("FX_RATES_URL") {
            self.rates_url = url;
        }
        if let Some(ttl) = lookup("FX_TTL_SECS") {
            self.ttl_secs = ttl.parse().context("FX_TTL_SECS must be a number of seconds")?;
        }
        if let Some(interval) = lookup("FX_CHECK_INTERVAL_SECS") {
            self.check_interval_secs = interval
                .parse()
                .context("FX_CHECK_INTERVAL_SECS must be a number of seconds")?;
        }
        if let Some(timeout) = lookup("FX_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = timeout
                .parse()
                .context("FX_REQUEST_TIMEOUT_SECS must be a number of seconds")?;
        }
        if let Some(store) = lookup("FX_STORE") {
            self.store = match store.to_ascii_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                "file" => StoreBackend::File,
                "sqlite" => StoreBackend::Sqlite,
                other => bail!("FX_STORE must be memory, file or sqlite (got {})", other),
            };
        }
        if let Some(path) = lookup("FX_STORE_PATH") {
            self.store_path = path;
        }
        if let Some(locale) = lookup("FX_LOCALE")
            .or_else(|| lookup("LC_ALL"))
            .or_else(|| lookup("LC_MONETARY"))
            .or_else(|| lookup("LANG"))
        {
            if self.locale.is_none() || lookup("FX_LOCALE").is_some() {
                self.locale = Some(locale);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.rates_url.trim().is_empty() {
            bail!("rates_url must not be empty");
        }
        if self.ttl_secs == 0 {
            bail!("ttl_secs must be greater than zero");
        }
        if self.ttl_secs > MAX_TTL_SECS {
            bail!("ttl_secs must be at most {} (got {})", MAX_TTL_SECS, self.ttl_secs);
        }
        if self.check_interval_secs == 0 {
            bail!("check_interval_secs must be greater than zero");
        }
        if self.check_interval_secs > MAX_CHECK_INTERVAL_SECS {
            bail!(
                "check_interval_secs must be at most {} (got {})",
                MAX_CHECK_INTERVAL_SECS,
                self.check_interval_secs
            );
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    let config_str = toml::to_string_pretty(config)?;
    fs::write(path, config_str)?;
    Ok(())
}
