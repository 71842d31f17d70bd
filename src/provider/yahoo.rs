use std::collections::HashMap;
use std::time::Duration;

use rayon::prelude::*;
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use super::{BarSeriesProvider, FetchWindow, ProviderError};
use crate::{Bar, BarSeries};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; vcpscan/0.1)";

/// Yahoo Finance chart API (`/v8/finance/chart/{symbol}`).
///
/// One request per ticker, issued in parallel. A ticker whose request is
/// rejected or whose payload is empty is left out of the result; the batch
/// fails only when every request fails.
#[derive(Debug, Clone)]
pub struct YahooProvider {
    client: Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn fetch_one(
        &self,
        ticker: &str,
        window: &FetchWindow,
    ) -> Result<Option<BarSeries>, ProviderError> {
        let url = chart_url(&self.base_url, ticker)?;
        let response = self
            .client
            .get(url)
            .query(&[
                ("range", window.lookback.to_string()),
                ("interval", window.interval.as_str().to_string()),
            ])
            .send()?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(ticker, "no chart data");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProviderError::Response(format!("{ticker}: HTTP {status}")));
        }

        let body = response.text()?;
        match parse_chart(&body) {
            Ok(bars) => Ok(bars),
            Err(error) => {
                tracing::warn!(ticker, %error, "discarding malformed chart payload");
                Ok(None)
            }
        }
    }
}

impl BarSeriesProvider for YahooProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    fn fetch(
        &self,
        tickers: &[String],
        window: &FetchWindow,
    ) -> Result<HashMap<String, BarSeries>, ProviderError> {
        let outcomes: Vec<_> = tickers
            .par_iter()
            .map(|ticker| (ticker, self.fetch_one(ticker, window)))
            .collect();

        let mut data = HashMap::with_capacity(tickers.len());
        let mut failed = 0;
        for (ticker, outcome) in outcomes {
            match outcome {
                Ok(Some(bars)) if !bars.is_empty() => {
                    data.insert(ticker.clone(), bars);
                }
                Ok(_) => {}
                Err(error) => {
                    failed += 1;
                    tracing::warn!(ticker = %ticker, %error, "chart request failed");
                }
            }
        }

        if failed > 0 && failed == tickers.len() {
            return Err(ProviderError::Unavailable { failed });
        }
        Ok(data)
    }
}

/// `{base}/v8/finance/chart/{ticker}` with the ticker escaped as one path segment
fn chart_url(base: &str, ticker: &str) -> Result<Url, ProviderError> {
    let mut url = Url::parse(base)
        .map_err(|e| ProviderError::Response(format!("invalid base url {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| ProviderError::Response(format!("base url cannot take a path: {base}")))?
        .pop_if_empty()
        .extend(["v8", "finance", "chart", ticker]);
    Ok(url)
}

// ============================================================
// RESPONSE PAYLOAD
// ============================================================

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[inline]
fn value_at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

/// Decode a chart payload into bars, dropping sessions with missing fields.
///
/// `Ok(None)` when the payload carries no result.
fn parse_chart(body: &str) -> Result<Option<BarSeries>, ProviderError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)?;
    if let Some(error) = envelope.chart.error {
        return Err(ProviderError::Response(format!(
            "{}: {}",
            error.code,
            error.description.unwrap_or_default()
        )));
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(None);
    };
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Ok(None);
    };

    let bars: BarSeries = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            Some(
                Bar::new(
                    value_at(&quote.open, i)?,
                    value_at(&quote.high, i)?,
                    value_at(&quote.low, i)?,
                    value_at(&quote.close, i)?,
                    value_at(&quote.volume, i)?,
                )
                .with_timestamp(ts),
            )
        })
        .collect();

    Ok(Some(bars))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "BBCA.JK", "currency": "IDR"},
                "timestamp": [1700000000, 1700086400, 1700172800],
                "indicators": {
                    "quote": [{
                        "open":   [9000.0, 9050.0, null],
                        "high":   [9100.0, 9150.0, 9200.0],
                        "low":    [8950.0, 9000.0, 9050.0],
                        "close":  [9050.0, 9100.0, 9150.0],
                        "volume": [1200000, 1300000, 1400000]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_chart_url_escapes_ticker() {
        let url = chart_url("https://query1.finance.yahoo.com", "BBCA.JK").unwrap();
        assert_eq!(url.as_str(), "https://query1.finance.yahoo.com/v8/finance/chart/BBCA.JK");

        let url = chart_url("http://127.0.0.1:9", "AB/CD.JK").unwrap();
        assert_eq!(url.path(), "/v8/finance/chart/AB%2FCD.JK");

        let url = chart_url("http://127.0.0.1:9/proxy", "^JKSE").unwrap();
        let segments: Vec<&str> = url.path_segments().unwrap().collect();
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0], "proxy");
        assert!(segments[4].ends_with("JKSE"));
    }

    #[test]
    fn test_chart_url_rejects_bad_base() {
        assert!(matches!(chart_url("not a url", "BBCA.JK"), Err(ProviderError::Response(_))));
    }

    #[test]
    fn test_parse_chart_drops_incomplete_sessions() {
        let bars = parse_chart(PAYLOAD).unwrap().unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(
            bars[0],
            Bar::new(9000.0, 9100.0, 8950.0, 9050.0, 1_200_000.0).with_timestamp(1_700_000_000)
        );
        assert_eq!(bars[1].timestamp, Some(1_700_086_400));
    }

    #[test]
    fn test_parse_chart_error_payload() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart(body).unwrap_err();
        assert!(matches!(err, ProviderError::Response(msg) if msg.contains("delisted")));
    }

    #[test]
    fn test_parse_chart_empty_result() {
        let body = r#"{"chart":{"result":[],"error":null}}"#;
        assert!(parse_chart(body).unwrap().is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = YahooProvider::with_base_url("http://localhost:9/").unwrap();
        assert_eq!(provider.base_url, "http://localhost:9");
    }

    #[test]
    fn test_unreachable_host_fails_the_batch() {
        // Port 9 (discard) on localhost refuses connections
        let provider = YahooProvider::with_base_url("http://127.0.0.1:9").unwrap();
        let tickers = vec!["BBCA.JK".to_string(), "TLKM.JK".to_string()];
        let err = provider.fetch(&tickers, &FetchWindow::default()).unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable { failed: 2 }));
    }
}
