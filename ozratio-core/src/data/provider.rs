//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over the remote price source so the retry
//! and fallback logic can be exercised against scripted providers in tests.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::DailyBar;

/// Structured error types for a single provider call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("provider returned HTTP {status} for {symbol}")]
    ServerError { symbol: String, status: u16 },

    #[error("no data returned for {symbol}")]
    EmptyResponse { symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("invalid provider URL: {0}")]
    InvalidUrl(String),
}

impl DataError {
    /// Whether the same request may succeed if simply tried again.
    ///
    /// An empty result counts as transient: the provider intermittently answers
    /// a valid query with no rows.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::NetworkUnreachable(_)
                | DataError::RateLimited { .. }
                | DataError::ServerError { .. }
                | DataError::EmptyResponse { .. }
        )
    }
}

/// Result of a successful data fetch for a single symbol.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<DailyBar>,
}

/// Trait for remote daily price sources.
pub trait DataProvider {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for `symbol` over the half-open range `[start, end)`.
    ///
    /// Bars come back sorted ascending with naive (exchange-local) dates.
    /// An empty answer must be reported as `DataError::EmptyResponse`.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<FetchResult, DataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(DataError::NetworkUnreachable("timeout".into()).is_transient());
        assert!(DataError::RateLimited {
            retry_after_secs: 60
        }
        .is_transient());
        assert!(DataError::ServerError {
            symbol: "GC=F".into(),
            status: 502
        }
        .is_transient());
        assert!(DataError::EmptyResponse {
            symbol: "GC=F".into()
        }
        .is_transient());

        assert!(!DataError::SymbolNotFound {
            symbol: "XX".into()
        }
        .is_transient());
        assert!(!DataError::ResponseFormatChanged("bad json".into()).is_transient());
        assert!(!DataError::AuthenticationRequired("401".into()).is_transient());
        assert!(!DataError::InvalidUrl("mailto:x".into()).is_transient());
    }
}
