pub mod http_client;
pub mod yahoo;

use crate::models::{DateRange, PriceSeries, Ticker};
use async_trait::async_trait;
use thiserror::Error;

pub use self::yahoo::YahooChartSource;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error fetching {ticker}: {source}")]
    Network {
        ticker: Ticker,
        #[source]
        source: reqwest::Error,
    },

    #[error("rate limited by provider while fetching {ticker}")]
    RateLimited { ticker: Ticker },

    #[error("symbol not found: {ticker}")]
    SymbolNotFound { ticker: Ticker },

    #[error("provider error for {ticker}: {code}: {description}")]
    Provider {
        ticker: Ticker,
        code: String,
        description: String,
    },

    #[error("provider returned HTTP {status} for {ticker}")]
    Http { ticker: Ticker, status: u16 },

    #[error("unexpected response for {ticker}: {reason}")]
    InvalidResponse { ticker: Ticker, reason: String },

    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable historical data source.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Daily OHLCV bars for `ticker` within `range` (end exclusive).
    ///
    /// An empty series is a valid answer, not an error.
    async fn fetch_history(
        &self,
        ticker: &Ticker,
        range: DateRange,
    ) -> Result<PriceSeries, ProviderError>;
}
