//! Yahoo Finance data provider.
//!
//! Fetches daily bars from Yahoo's v8 chart API. A single call makes exactly
//! one HTTP request; retrying is the caller's job (see `data::retry`), which
//! keeps the backoff schedule in one place.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::provider::{DataError, DataProvider, FetchResult};
use crate::domain::DailyBar;
use chrono::{DateTime, NaiveDate, TimeZone};
use chrono_tz::Tz;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const CHART_BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
pub(crate) struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
    exchange_timezone_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
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
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: Url,
}

impl YahooProvider {
    pub fn new(timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: parse_base_url(CHART_BASE_URL)?,
        })
    }

    /// Point the provider at a different host (mirrors, local fixtures).
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, DataError> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    /// Build the chart API URL for a symbol and the half-open range `[start, end)`.
    ///
    /// The symbol is pushed as one path segment; the URL encoder escapes
    /// anything that would split it.
    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Url, DataError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DataError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(symbol);
        url.query_pairs_mut()
            .append_pair("period1", &midnight_utc(start).to_string())
            .append_pair("period2", &midnight_utc(end).to_string())
            .append_pair("interval", "1d")
            .append_pair("includeAdjustedClose", "true");
        Ok(url)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, DataError> {
    let url = Url::parse(raw).map_err(|e| DataError::InvalidUrl(format!("{raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(DataError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// How a response's timestamps map onto exchange-local days.
///
/// `gmtoffset` is the offset in force when the request was made, so it is
/// only right for bars on the same side of a daylight-saving change. The
/// named zone is used whenever Yahoo supplies one that parses.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ExchangeClock {
    Zone(Tz),
    Fixed(i64),
}

impl ExchangeClock {
    fn from_meta(meta: Option<&ChartMeta>) -> Self {
        let zone = meta
            .and_then(|m| m.exchange_timezone_name.as_deref())
            .and_then(|name| name.parse::<Tz>().ok());
        match zone {
            Some(tz) => ExchangeClock::Zone(tz),
            None => ExchangeClock::Fixed(meta.map(|m| m.gmtoffset).unwrap_or(0)),
        }
    }

    /// Exchange-local calendar day of an epoch timestamp.
    fn local_trading_day(self, ts: i64) -> Option<NaiveDate> {
        match self {
            ExchangeClock::Zone(tz) => {
                let utc = DateTime::from_timestamp(ts, 0)?;
                Some(tz.from_utc_datetime(&utc.naive_utc()).date_naive())
            }
            ExchangeClock::Fixed(offset) => {
                DateTime::from_timestamp(ts.checked_add(offset)?, 0).map(|dt| dt.date_naive())
            }
        }
    }
}

/// Parse the chart API response into bars within `[start, end)`.
pub(crate) fn parse_response(
    symbol: &str,
    resp: ChartResponse,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<DailyBar>, DataError> {
    let result = match resp.chart.result {
        Some(r) => r,
        None => {
            return Err(match resp.chart.error {
                Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                },
                Some(err) => {
                    DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
                }
                None => DataError::EmptyResponse {
                    symbol: symbol.to_string(),
                },
            })
        }
    };

    let Some(data) = result.into_iter().next() else {
        return Err(DataError::EmptyResponse {
            symbol: symbol.to_string(),
        });
    };

    // A chart with no timestamps is how Yahoo says "no rows in this range".
    let Some(timestamps) = data.timestamp else {
        return Err(DataError::EmptyResponse {
            symbol: symbol.to_string(),
        });
    };

    let clock = ExchangeClock::from_meta(data.meta.as_ref());
    debug!(symbol, ?clock, "normalizing timestamps to exchange-local dates");

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let mut bars: Vec<DailyBar> = Vec::with_capacity(timestamps.len());

    for (i, &ts) in timestamps.iter().enumerate() {
        let date = clock.local_trading_day(ts).ok_or_else(|| {
            DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
        })?;

        if date < start || date >= end {
            continue;
        }

        let open = quote.open.get(i).copied().flatten();
        let high = quote.high.get(i).copied().flatten();
        let low = quote.low.get(i).copied().flatten();
        let close = quote.close.get(i).copied().flatten();
        let volume = quote.volume.get(i).copied().flatten();
        let adj_close = adj_closes
            .as_ref()
            .and_then(|v| v.get(i).copied().flatten());

        // Skip rows where all OHLCV are None (holidays/non-trading days)
        if open.is_none()
            && high.is_none()
            && low.is_none()
            && close.is_none()
            && volume.is_none()
        {
            continue;
        }

        // Intraday "live" rows can repeat the last session's date; keep the first.
        if bars.last().is_some_and(|b| b.date == date) {
            continue;
        }

        bars.push(DailyBar {
            date,
            open: open.unwrap_or(f64::NAN),
            high: high.unwrap_or(f64::NAN),
            low: low.unwrap_or(f64::NAN),
            close: close.unwrap_or(f64::NAN),
            adj_close: adj_close.unwrap_or(f64::NAN),
            volume: volume.unwrap_or(0),
        });
    }

    if bars.is_empty() {
        return Err(DataError::EmptyResponse {
            symbol: symbol.to_string(),
        });
    }

    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let url = self.chart_url(symbol, start, end)?;
        debug!(symbol, %url, "requesting chart");

        let resp = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                DataError::NetworkUnreachable(format!("timeout: {e}"))
            } else {
                DataError::NetworkUnreachable(e.to_string())
            }
        })?;

        let status = resp.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(DataError::AuthenticationRequired(format!(
                "Yahoo Finance answered HTTP {status}"
            )));
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        if status.is_server_error() {
            return Err(DataError::ServerError {
                symbol: symbol.to_string(),
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            return Err(DataError::ResponseFormatChanged(format!(
                "unexpected HTTP {status} for {symbol}"
            )));
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        let bars = parse_response(symbol, chart, start, end)?;
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
        })
    }
}
