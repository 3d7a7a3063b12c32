// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the currency subsystem.

use thiserror::Error;

/// Result type alias using `FxError`.
pub type FxResult<T> = Result<T, FxError>;

/// Everything that can go wrong while fetching, caching or selecting a currency.
///
/// None of these are fatal: the context falls back to identity rates, the
/// current table or the base currency and keeps serving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FxError {
    /// Network, HTTP status or payload validation failure.
    #[error("Exchange rates unavailable: {0}")]
    FetchFailure(String),

    /// Stored entry missing a part, corrupt, or store unreadable.
    #[error("Failed to read cached rates: {0}")]
    CacheReadFailure(String),

    /// A currency code outside the supported set.
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrencyRequested(String),

    /// Store could not be opened or written.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl FxError {
    /// Short machine-readable code, same vocabulary as the storefront API.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::FetchFailure(_) => "RATE_NOT_AVAILABLE",
            Self::CacheReadFailure(_) => "CACHE_READ_FAILURE",
            Self::UnsupportedCurrencyRequested(_) => "UNSUPPORTED_CURRENCY",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<sqlx::Error> for FxError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for FxError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<std::io::Error> for FxError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            FxError::FetchFailure("HTTP 500".into()).error_code(),
            "RATE_NOT_AVAILABLE"
        );
        assert_eq!(
            FxError::UnsupportedCurrencyRequested("XYZ".into()).error_code(),
            "UNSUPPORTED_CURRENCY"
        );
    }

    #[test]
    fn test_display_includes_detail() {
        let err = FxError::UnsupportedCurrencyRequested("XYZ".into());
        assert_eq!(err.to_string(), "Unsupported currency: XYZ");
    }
}
