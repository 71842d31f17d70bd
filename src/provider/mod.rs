//! Historical bar providers
//!
//! A provider answers one batched request for many tickers. Tickers it has no
//! data for are simply missing from the returned map; only a failure of the
//! batch as a whole is an error.

mod file;
mod yahoo;

pub use file::FileProvider;
pub use yahoo::YahooProvider;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::BarSeries;

// ============================================================
// ERRORS
// ============================================================

/// Failure of a whole batched fetch
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to read bar data: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed bar data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected response: {0}")]
    Response(String),

    #[error("Provider unavailable: all {failed} requests failed")]
    Unavailable { failed: usize },
}

// ============================================================
// FETCH WINDOW
// ============================================================

/// How far back to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    Days(u32),
    Months(u32),
    Years(u32),
}

impl Default for Lookback {
    fn default() -> Self {
        Lookback::Months(3)
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookback::Days(n) => write!(f, "{n}d"),
            Lookback::Months(n) => write!(f, "{n}mo"),
            Lookback::Years(n) => write!(f, "{n}y"),
        }
    }
}

impl FromStr for Lookback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("Missing unit in lookback: {s}"))?;
        let (amount, unit) = s.split_at(split);
        let amount: u32 = amount
            .parse()
            .map_err(|_| format!("Invalid lookback amount: {s}"))?;
        if amount == 0 {
            return Err(format!("Lookback must be positive: {s}"));
        }
        match unit {
            "d" | "day" | "days" => Ok(Lookback::Days(amount)),
            "mo" | "month" | "months" => Ok(Lookback::Months(amount)),
            "y" | "year" | "years" => Ok(Lookback::Years(amount)),
            _ => Err(format!("Unknown lookback unit: {unit}")),
        }
    }
}

/// Bar interval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Interval {
    #[default]
    Daily,
    Weekly,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::Weekly => "1wk",
        }
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" | "d" | "daily" => Ok(Interval::Daily),
            "1wk" | "wk" | "weekly" => Ok(Interval::Weekly),
            _ => Err(format!("Unknown interval: {s}")),
        }
    }
}

/// Lookback and interval of a batched request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchWindow {
    pub lookback: Lookback,
    pub interval: Interval,
}

// ============================================================
// PROVIDER TRAIT
// ============================================================

/// Source of historical bars for many tickers in one call
pub trait BarSeriesProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch bars for `tickers`. Tickers without data are absent from the map.
    fn fetch(
        &self,
        tickers: &[String],
        window: &FetchWindow,
    ) -> Result<HashMap<String, BarSeries>, ProviderError>;
}

/// In-memory provider
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    series: HashMap<String, BarSeries>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: impl Into<String>, bars: BarSeries) -> &mut Self {
        self.series.insert(ticker.into(), bars);
        self
    }

    pub fn with(mut self, ticker: impl Into<String>, bars: BarSeries) -> Self {
        self.insert(ticker, bars);
        self
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl FromIterator<(String, BarSeries)> for StaticProvider {
    fn from_iter<I: IntoIterator<Item = (String, BarSeries)>>(iter: I) -> Self {
        Self {
            series: iter.into_iter().collect(),
        }
    }
}

/// Keep only the requested tickers from a full map
pub(crate) fn select(
    mut available: HashMap<String, BarSeries>,
    tickers: &[String],
) -> HashMap<String, BarSeries> {
    tickers
        .iter()
        .filter_map(|t| available.remove_entry(t))
        .collect()
}

impl BarSeriesProvider for StaticProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    fn fetch(
        &self,
        tickers: &[String],
        _window: &FetchWindow,
    ) -> Result<HashMap<String, BarSeries>, ProviderError> {
        Ok(tickers
            .iter()
            .filter_map(|t| self.series.get(t).map(|bars| (t.clone(), bars.clone())))
            .collect())
    }
}
