//! Per-ticker pattern analysis
//!
//! An analyzer turns one ticker's bar history into an optional [`Signal`].
//! Faults inside the computation are classified as [`AnalysisError`] by
//! [`SignalAnalyzer::try_analyze`]; [`SignalAnalyzer::analyze`] contains them
//! at the ticker boundary so one bad series never aborts a batch.

pub mod helpers;
pub mod vcp;

pub use vcp::{VcpAnalyzer, VcpMetrics};

use crate::{ParamsError, OHLCV};

// ============================================================
// ERRORS
// ============================================================

/// Fault while analyzing one ticker's series
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidBar { index: usize, reason: &'static str },

    #[error("Degenerate window: {0}")]
    Degenerate(&'static str),
}

// ============================================================
// SIGNAL
// ============================================================

/// Setup classification of an accepted ticker
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    /// Range contracted below the ready threshold
    VcpReady,
    /// Accumulating inside a range that is not yet fully contracted
    Accum,
}

impl SignalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalStatus::VcpReady => "VCP_READY",
            SignalStatus::Accum => "ACCUM",
        }
    }
}

impl std::fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An accepted ticker. Only analyzers create these.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Signal {
    ticker: String,
    price: i64,
    tightness: f64,
    entry_score: u8,
    gap_probability: f64,
    status: SignalStatus,
}

impl Signal {
    pub(crate) fn new(
        ticker: impl Into<String>,
        price: i64,
        tightness: f64,
        entry_score: u8,
        gap_probability: f64,
        status: SignalStatus,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            price,
            tightness,
            entry_score,
            gap_probability,
            status,
        }
    }

    /// Ticker as requested from the provider (e.g. `BBCA.JK`)
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Ticker with its exchange suffix stripped (e.g. `BBCA`)
    pub fn display_ticker(&self) -> &str {
        self.ticker
            .split_once('.')
            .map_or(self.ticker.as_str(), |(symbol, _)| symbol)
    }

    /// Latest close, truncated
    pub fn price(&self) -> i64 {
        self.price
    }

    /// Normalized 5-bar range as a ratio (0.03 == 3%)
    pub fn tightness(&self) -> f64 {
        self.tightness
    }

    pub fn tightness_pct(&self) -> f64 {
        self.tightness * 100.0
    }

    pub fn entry_score(&self) -> u8 {
        self.entry_score
    }

    /// Historical gap-up frequency, 0..=100
    pub fn gap_probability_pct(&self) -> f64 {
        self.gap_probability
    }

    pub fn status(&self) -> SignalStatus {
        self.status
    }
}

// ============================================================
// ANALYZER TRAIT
// ============================================================

/// A heuristic that screens one ticker's bars
pub trait SignalAnalyzer: Send + Sync {
    fn id(&self) -> &'static str;

    /// Shortest series the analyzer will look at
    fn min_bars(&self) -> usize;

    fn validate_config(&self) -> Result<(), ParamsError> {
        Ok(())
    }

    /// Analyze with faults surfaced.
    ///
    /// `Ok(None)` means the ticker was screened out (short history,
    /// illiquid, or not matching); `Err` means the data could not be analyzed.
    fn try_analyze<T: OHLCV>(
        &self,
        ticker: &str,
        bars: &[T],
    ) -> Result<Option<Signal>, AnalysisError>;

    /// Analyze with faults degraded to `None`
    fn analyze<T: OHLCV>(&self, ticker: &str, bars: &[T]) -> Option<Signal> {
        match self.try_analyze(ticker, bars) {
            Ok(signal) => signal,
            Err(error) => {
                tracing::debug!(analyzer = self.id(), ticker, %error, "analysis fault, no signal");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_ticker_strips_exchange_suffix() {
        let signal = Signal::new("BBCA.JK", 9000, 0.03, 100, 40.0, SignalStatus::VcpReady);
        assert_eq!(signal.display_ticker(), "BBCA");
        assert_eq!(signal.ticker(), "BBCA.JK");

        let bare = Signal::new("AAPL", 190, 0.05, 70, 50.0, SignalStatus::Accum);
        assert_eq!(bare.display_ticker(), "AAPL");
    }

    #[test]
    fn test_status_serializes_as_screaming_snake() {
        let json = serde_json::to_string(&SignalStatus::VcpReady).unwrap();
        assert_eq!(json, "\"VCP_READY\"");
        assert_eq!(SignalStatus::Accum.to_string(), "ACCUM");
    }

    #[test]
    fn test_tightness_pct() {
        let signal = Signal::new("TLKM.JK", 3120, 0.034, 70, 20.0, SignalStatus::VcpReady);
        assert!((signal.tightness_pct() - 3.4).abs() < 1e-9);
    }
}
