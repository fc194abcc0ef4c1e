//! Yahoo Finance v8 chart endpoint.
//!
//! One request per ticker covering the whole date range at `interval=1d`.
//! The payload is columnar (parallel arrays indexed by timestamp), so the
//! adapter zips it back into rows. Rows where every OHLCV field is null are
//! exchange holidays that Yahoo pads in; they are dropped here, the same
//! cleanup the provider's own client libraries perform.

use super::http_client::HttpClient;
use super::{MarketDataSource, ProviderError};
use crate::config::ProviderConfig;
use crate::models::{DateRange, PriceBar, PriceSeries, Ticker};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

// ── Response payload ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds (-14400 for New York in summer).
    gmtoffset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

// ── Source ────────────────────────────────────────────────────────────────────

pub struct YahooChartSource {
    client: HttpClient,
    base_url: Url,
}

impl YahooChartSource {
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid provider base_url {:?}", config.base_url))?;

        Ok(Self {
            client: HttpClient::new(config)?,
            base_url,
        })
    }
}

#[async_trait]
impl MarketDataSource for YahooChartSource {
    async fn fetch_history(
        &self,
        ticker: &Ticker,
        range: DateRange,
    ) -> Result<PriceSeries, ProviderError> {
        let url = chart_url(&self.base_url, ticker, range)?;
        info!("Fetching {} ({})", ticker, range);

        let (status, body) = self
            .client
            .get_text(&url)
            .await
            .map_err(|source| ProviderError::Network {
                ticker: ticker.clone(),
                source,
            })?;

        let series = parse_chart(ticker, status, &body)?;
        debug!("{}: {} bars", ticker, series.len());
        Ok(series)
    }
}

// ── Request ───────────────────────────────────────────────────────────────────

/// `{base}/v8/finance/chart/{SYMBOL}?period1=..&period2=..&interval=1d...`
///
/// `period2` is midnight UTC of the end date, which makes the end exclusive.
fn chart_url(base: &Url, ticker: &Ticker, range: DateRange) -> Result<Url, ProviderError> {
    let mut url = base.clone();
    if url.cannot_be_a_base() {
        return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase.into());
    }

    // url's path encoder leaves '^' alone; Yahoo expects it escaped
    let symbol = ticker.as_str().replace('^', "%5E");
    let prefix = base.path().trim_end_matches('/');
    url.set_path(&format!("{prefix}/v8/finance/chart/{symbol}"));

    url.query_pairs_mut()
        .clear()
        .append_pair("period1", &midnight_utc(range.start()).to_string())
        .append_pair("period2", &midnight_utc(range.end()).to_string())
        .append_pair("interval", "1d")
        .append_pair("includeAdjustedClose", "true")
        .append_pair("events", "div,split");

    Ok(url)
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

// ── Response ──────────────────────────────────────────────────────────────────

fn parse_chart(
    ticker: &Ticker,
    status: StatusCode,
    body: &str,
) -> Result<PriceSeries, ProviderError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited {
            ticker: ticker.clone(),
        });
    }

    // Yahoo reports unknown symbols as 404 with a chart.error body
    let chart = match serde_json::from_str::<ChartResponse>(body) {
        Ok(resp) => resp.chart,
        Err(e) if status.is_success() => {
            return Err(ProviderError::InvalidResponse {
                ticker: ticker.clone(),
                reason: format!("malformed chart payload: {e}"),
            });
        }
        Err(_) => {
            return Err(ProviderError::Http {
                ticker: ticker.clone(),
                status: status.as_u16(),
            });
        }
    };

    if let Some(err) = chart.error {
        return Err(if err.code == "Not Found" {
            ProviderError::SymbolNotFound {
                ticker: ticker.clone(),
            }
        } else {
            ProviderError::Provider {
                ticker: ticker.clone(),
                code: err.code,
                description: err.description,
            }
        });
    }

    if !status.is_success() {
        return Err(ProviderError::Http {
            ticker: ticker.clone(),
            status: status.as_u16(),
        });
    }

    let data = chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| ProviderError::InvalidResponse {
            ticker: ticker.clone(),
            reason: "chart result is empty".into(),
        })?;

    series_from_chart(ticker, data)
}

fn series_from_chart(ticker: &Ticker, data: ChartData) -> Result<PriceSeries, ProviderError> {
    let invalid = |reason: String| ProviderError::InvalidResponse {
        ticker: ticker.clone(),
        reason,
    };

    let timestamps = data.timestamp.unwrap_or_default();
    if timestamps.is_empty() {
        return Ok(PriceSeries::empty(ticker.clone()));
    }

    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
    let adj_close = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose)
        .unwrap_or_default();

    // An absent column reads as all nulls; a present one must line up.
    let n = timestamps.len();
    let columns = [
        ("open", quote.open.len()),
        ("high", quote.high.len()),
        ("low", quote.low.len()),
        ("close", quote.close.len()),
        ("volume", quote.volume.len()),
        ("adjclose", adj_close.len()),
    ];
    for (name, len) in columns {
        if len != 0 && len != n {
            return Err(invalid(format!("{name} has {len} values for {n} timestamps")));
        }
    }

    let offset = data.meta.gmtoffset.unwrap_or(0);
    let mut bars = Vec::with_capacity(n);

    for (i, &ts) in timestamps.iter().enumerate() {
        let date = DateTime::from_timestamp(ts + offset, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| invalid(format!("timestamp out of range: {ts}")))?;

        let bar = PriceBar {
            date,
            open: quote.open.get(i).copied().flatten(),
            high: quote.high.get(i).copied().flatten(),
            low: quote.low.get(i).copied().flatten(),
            close: quote.close.get(i).copied().flatten(),
            adj_close: adj_close.get(i).copied().flatten(),
            volume: quote.volume.get(i).copied().flatten(),
        };

        if bar.open.is_none()
            && bar.high.is_none()
            && bar.low.is_none()
            && bar.close.is_none()
            && bar.volume.is_none()
        {
            debug!("{}: dropping empty row for {}", ticker, date);
            continue;
        }

        bars.push(bar);
    }

    Ok(PriceSeries {
        ticker: ticker.clone(),
        bars,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker(s: &str) -> Ticker {
        Ticker::parse(s).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn range() -> DateRange {
        DateRange::new(date("2023-07-01"), date("2025-04-30")).unwrap()
    }

    // 2024-01-02/03/04 at 09:30 New York (14:30 UTC); the 03rd is all nulls.
    const THREE_DAYS: &str = r#"{
      "chart": {
        "result": [{
          "meta": { "symbol": "NVDA", "gmtoffset": -18000 },
          "timestamp": [1704205800, 1704292200, 1704378600],
          "indicators": {
            "quote": [{
              "open":   [49.24, null, 47.77],
              "high":   [49.29, null, 48.5],
              "low":    [47.59, null, 47.51],
              "close":  [48.17, null, 47.57],
              "volume": [411254000, null, 306535000]
            }],
            "adjclose": [{ "adjclose": [48.15, null, 47.55] }]
          }
        }],
        "error": null
      }
    }"#;

    #[test]
    fn test_chart_url_encodes_symbol_and_range() {
        let base = Url::parse("https://query2.finance.yahoo.com").unwrap();
        let url = chart_url(&base, &ticker("^IXIC"), range()).unwrap();

        assert_eq!(url.path(), "/v8/finance/chart/%5EIXIC");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |k: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("period1"), Some("1688169600"));
        assert_eq!(get("period2"), Some("1745971200"));
        assert_eq!(get("interval"), Some("1d"));
        assert_eq!(get("includeAdjustedClose"), Some("true"));
    }

    #[test]
    fn test_chart_url_keeps_base_path_prefix() {
        let base = Url::parse("http://127.0.0.1:8080/yahoo/").unwrap();
        let url = chart_url(&base, &ticker("MSFT"), range()).unwrap();
        assert_eq!(url.path(), "/yahoo/v8/finance/chart/MSFT");
    }

    #[test]
    fn test_parse_zips_columns_and_drops_null_rows() {
        let series = parse_chart(&ticker("NVDA"), StatusCode::OK, THREE_DAYS).unwrap();

        assert_eq!(series.ticker.as_str(), "NVDA");
        assert_eq!(series.len(), 2);

        let first = &series.bars[0];
        assert_eq!(first.date, date("2024-01-02"));
        assert_eq!(first.open, Some(49.24));
        assert_eq!(first.close, Some(48.17));
        assert_eq!(first.adj_close, Some(48.15));
        assert_eq!(first.volume, Some(411_254_000));

        assert_eq!(series.bars[1].date, date("2024-01-04"));
    }

    #[test]
    fn test_dates_use_exchange_offset() {
        // 2024-01-03 02:00 UTC is still the 2nd in New York
        let body = r#"{"chart":{"result":[{
            "meta":{"gmtoffset":-18000},
            "timestamp":[1704247200],
            "indicators":{"quote":[{"open":[1.0],"high":[1.0],"low":[1.0],"close":[1.0],"volume":[10]}]}
        }],"error":null}}"#;

        let series = parse_chart(&ticker("X"), StatusCode::OK, body).unwrap();
        assert_eq!(series.bars[0].date, date("2024-01-02"));
        assert_eq!(series.bars[0].adj_close, None);
    }

    #[test]
    fn test_no_timestamps_is_empty_series() {
        let body = r#"{"chart":{"result":[{
            "meta":{"symbol":"GOOG","gmtoffset":-14400},
            "indicators":{"quote":[{}],"adjclose":[{}]}
        }],"error":null}}"#;

        let series = parse_chart(&ticker("GOOG"), StatusCode::OK, body).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_not_found_maps_to_symbol_not_found() {
        let body = r#"{"chart":{"result":null,"error":{
            "code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;

        let err = parse_chart(&ticker("ZZZZ"), StatusCode::NOT_FOUND, body).unwrap_err();
        assert!(matches!(err, ProviderError::SymbolNotFound { ref ticker } if ticker.as_str() == "ZZZZ"));
    }

    #[test]
    fn test_other_chart_error_is_provider_error() {
        let body = r#"{"chart":{"result":null,"error":{
            "code":"Bad Request","description":"Invalid input - interval=1x is not supported"}}}"#;

        let err = parse_chart(&ticker("AAPL"), StatusCode::BAD_REQUEST, body).unwrap_err();
        match err {
            ProviderError::Provider { code, description, .. } => {
                assert_eq!(code, "Bad Request");
                assert!(description.contains("interval"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_status_errors() {
        let t = ticker("AAPL");

        let err = parse_chart(&t, StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));

        let err = parse_chart(&t, StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ProviderError::Http { status: 502, .. }));

        let err = parse_chart(&t, StatusCode::OK, "<html>consent</html>").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse { .. }));
    }

    #[test]
    fn test_missing_volume_column_reads_as_nulls() {
        let body = r#"{"chart":{"result":[{
            "meta":{"gmtoffset":-18000},
            "timestamp":[1704205800, 1704292200],
            "indicators":{"quote":[{"open":[20.1,21.0],"high":[20.9,21.4],"low":[19.8,20.5],"close":[20.4,21.2]}]}
        }],"error":null}}"#;

        let series = parse_chart(&ticker("^VIX"), StatusCode::OK, body).unwrap();
        assert_eq!(series.len(), 2);
        assert!(series.bars.iter().all(|b| b.volume.is_none()));
        assert_eq!(series.bars[1].close, Some(21.2));
    }

    #[test]
    fn test_ragged_columns_are_rejected() {
        let body = r#"{"chart":{"result":[{
            "timestamp":[1704205800, 1704292200],
            "indicators":{"quote":[{"open":[1.0],"high":[1.0,2.0],"low":[1.0,2.0],"close":[1.0,2.0],"volume":[1,2]}]}
        }],"error":null}}"#;

        let err = parse_chart(&ticker("X"), StatusCode::OK, body).unwrap_err();
        assert!(err.to_string().contains("open has 1 values for 2 timestamps"));
    }
}
