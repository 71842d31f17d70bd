//! # vcpscan - Volatility Contraction Pattern Screener
//!
//! Screens a universe of equity tickers for a tight trading range (volatility
//! contraction) combined with an accumulation signal (price advancing on
//! above-average volume), and renders the accepted tickers as a ranked report.
//!
//! ## Quick Start
//!
//! ```rust
//! use vcpscan::prelude::*;
//!
//! // Any bar type works as long as it exposes OHLCV
//! struct Candle { o: f64, h: f64, l: f64, c: f64, v: f64 }
//!
//! impl OHLCV for Candle {
//!     fn open(&self) -> f64 { self.o }
//!     fn high(&self) -> f64 { self.h }
//!     fn low(&self) -> f64 { self.l }
//!     fn close(&self) -> f64 { self.c }
//!     fn volume(&self) -> f64 { self.v }
//! }
//!
//! let analyzer = VcpAnalyzer::default();
//! let candles: Vec<Candle> = vec![];
//! assert!(analyzer.analyze("BBCA.JK", &candles).is_none());
//!
//! // Batch runs go through the engine and a provider
//! let engine = EngineBuilder::new().build().unwrap();
//! let provider = StaticProvider::new();
//! let result = engine.run(&[], &provider).unwrap();
//! assert!(result.is_empty());
//! ```

pub mod analyzer;
pub mod config;
pub mod engine;
pub mod logging;
pub mod notify;
pub mod params;
pub mod provider;
pub mod report;

pub mod prelude {
    pub use crate::{
        // Analysis
        analyzer::{AnalysisError, Signal, SignalAnalyzer, SignalStatus, VcpAnalyzer, VcpMetrics},
        // Engine
        engine::{scan_parallel, EngineBuilder, EngineConfig, ScanEngine, ScanResult, TickerFault},
        // Collaborators
        notify::{deliver, ConsoleSink, NotificationSink, NotifyError, TelegramSink},
        // Parameters
        params::{ParamMeta, ParamType, ScanParams},
        provider::{
            BarSeriesProvider, FetchWindow, FileProvider, Interval, Lookback, ProviderError,
            StaticProvider, YahooProvider,
        },
        // Reporting
        report::{format_report, ReportFormat, ScanReport},
        // Core types
        Bar,
        BarSeries,
        OHLCVExt,
        Period,
        Ratio,
        OHLCV,
        // Errors
        ParamsError,
        ScanError,
    };
}

// ============================================================
// ERRORS
// ============================================================

/// Errors raised while validating scan parameters
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Errors that fail a whole scan run
///
/// Faults local to one ticker never show up here; they are contained by the
/// analyzer and only counted in [`engine::ScanResult::faults`].
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Bar series provider failed: {0}")]
    Provider(#[from] provider::ProviderError),

    #[error("Invalid scan configuration: {0}")]
    Config(#[from] ParamsError),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self, ParamsError> {
        if value.is_nan() || value.is_infinite() {
            return Err(ParamsError::InvalidValue("Ratio cannot be NaN or infinite"));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(ParamsError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Window length in bars (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self, ParamsError> {
        if value == 0 {
            return Err(ParamsError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    /// True when this bar opened above `prev`'s close
    #[inline]
    fn gapped_up_from<P: OHLCV + ?Sized>(&self, prev: &P) -> bool {
        self.open() > prev.close()
    }

    /// Validate OHLCV data consistency.
    ///
    /// Rejects NaN/infinite and negative fields, and `high < low`.
    fn validate(&self) -> Result<(), &'static str> {
        let fields = [
            self.open(),
            self.high(),
            self.low(),
            self.close(),
            self.volume(),
        ];
        if fields.iter().any(|v| v.is_nan()) {
            return Err("NaN in OHLCV");
        }
        if fields.iter().any(|v| v.is_infinite()) {
            return Err("Infinite value in OHLCV");
        }
        if fields.iter().any(|v| *v < 0.0) {
            return Err("Negative value in OHLCV");
        }
        if self.high() < self.low() {
            return Err("high < low");
        }
        Ok(())
    }
}

impl<T: OHLCV + ?Sized> OHLCVExt for T {}

// ============================================================
// BAR SERIES
// ============================================================

/// One session's open/high/low/close/volume
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Session start as unix seconds, when the source provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Bar {
    pub fn new(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
            volume,
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl OHLCV for Bar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }
}

/// Daily bars for one ticker, ascending by date
pub type BarSeries = Vec<Bar>;

// ============================================================
// TESTS
// ============================================================
