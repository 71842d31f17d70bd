//! Batch scan orchestration
//!
//! [`ScanEngine::run`] fetches every ticker in one provider call, then fans
//! the per-ticker analysis out over a bounded rayon pool. Tasks borrow their
//! own slice of the fetched data and share nothing mutable, so the parallel
//! `collect` is the only synchronization point.

use std::collections::HashSet;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::analyzer::{AnalysisError, Signal, SignalAnalyzer, VcpAnalyzer};
use crate::params::{ScanParams, DEFAULT_MAX_WORKERS};
use crate::provider::{BarSeriesProvider, FetchWindow};
use crate::{Bar, ParamsError, ScanError, OHLCV};

// ============================================================
// RESULTS
// ============================================================

/// Analysis fault for one ticker
#[derive(Debug, Clone, PartialEq)]
pub struct TickerFault {
    pub symbol: String,
    pub error: AnalysisError,
}

/// Accepted signals of one run, with run counters
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    signals: Vec<Signal>,
    requested: usize,
    with_data: usize,
    faults: usize,
}

impl ScanResult {
    pub(crate) fn new(
        signals: Vec<Signal>,
        requested: usize,
        with_data: usize,
        faults: usize,
    ) -> Self {
        Self {
            signals,
            requested,
            with_data,
            faults,
        }
    }

    /// Signals in collection order
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Distinct tickers requested from the provider
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Tickers the provider returned data for
    pub fn with_data(&self) -> usize {
        self.with_data
    }

    /// Tickers whose analysis faulted
    pub fn faults(&self) -> usize {
        self.faults
    }

    /// Signals sorted by entry score, highest first. Ties keep collection order.
    pub fn ranked(&self) -> Vec<&Signal> {
        let mut ranked: Vec<&Signal> = self.signals.iter().collect();
        ranked.sort_by(|a, b| b.entry_score().cmp(&a.entry_score()));
        ranked
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

/// Analyze already-fetched instruments in parallel on the current rayon pool.
///
/// Returns accepted signals and analysis faults, both in input order.
pub fn scan_parallel<'a, T, I, A>(analyzer: &A, instruments: I) -> (Vec<Signal>, Vec<TickerFault>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
    A: SignalAnalyzer,
{
    let outcomes: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            analyzer
                .try_analyze(symbol, bars)
                .map_err(|error| TickerFault {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut signals = Vec::new();
    let mut faults = Vec::new();

    for outcome in outcomes {
        match outcome {
            Ok(Some(signal)) => signals.push(signal),
            Ok(None) => {}
            Err(fault) => faults.push(fault),
        }
    }

    (signals, faults)
}

// ============================================================
// SCAN ENGINE
// ============================================================

/// Engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Concurrent analysis tasks
    pub max_workers: usize,
    pub window: FetchWindow,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            window: FetchWindow::default(),
        }
    }
}

/// Fetches, analyzes and collects one scan run
pub struct ScanEngine<A: SignalAnalyzer = VcpAnalyzer> {
    analyzer: A,
    config: EngineConfig,
    pool: rayon::ThreadPool,
}

impl<A: SignalAnalyzer> ScanEngine<A> {
    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one scan over `tickers`.
    ///
    /// Duplicate tickers are analyzed once. Tickers the provider has no data
    /// for are skipped. Only a provider failure fails the run.
    pub fn run<P>(&self, tickers: &[String], provider: &P) -> Result<ScanResult, ScanError>
    where
        P: BarSeriesProvider + ?Sized,
    {
        let tickers = dedup(tickers);
        if tickers.is_empty() {
            info!("no tickers to scan");
            return Ok(ScanResult::default());
        }

        info!(
            tickers = tickers.len(),
            provider = provider.name(),
            lookback = %self.config.window.lookback,
            "fetching bar series"
        );
        let data = provider.fetch(&tickers, &self.config.window)?;

        let instruments: Vec<(&str, &[Bar])> = tickers
            .iter()
            .filter_map(|ticker| match data.get(ticker) {
                Some(bars) => Some((ticker.as_str(), bars.as_slice())),
                None => {
                    debug!(ticker = %ticker, "no data from provider, skipping");
                    None
                }
            })
            .collect();
        let with_data = instruments.len();

        let (signals, faults) = self
            .pool
            .install(|| scan_parallel(&self.analyzer, instruments));

        for fault in &faults {
            debug!(ticker = %fault.symbol, error = %fault.error, "analysis fault, no signal");
        }
        info!(
            requested = tickers.len(),
            with_data,
            accepted = signals.len(),
            faults = faults.len(),
            "scan complete"
        );

        Ok(ScanResult::new(signals, tickers.len(), with_data, faults.len()))
    }
}

/// Drop repeated tickers, first occurrence wins
fn dedup(tickers: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(tickers.len());
    tickers
        .iter()
        .filter(|t| seen.insert(t.as_str()))
        .cloned()
        .collect()
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for [`ScanEngine`]
pub struct EngineBuilder<A: SignalAnalyzer = VcpAnalyzer> {
    analyzer: A,
    config: EngineConfig,
}

impl Default for EngineBuilder<VcpAnalyzer> {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder<VcpAnalyzer> {
    pub fn new() -> Self {
        Self {
            analyzer: VcpAnalyzer::default(),
            config: EngineConfig::default(),
        }
    }

    /// Thresholds for the built-in analyzer
    pub fn params(mut self, params: ScanParams) -> Self {
        self.analyzer = VcpAnalyzer::new(params);
        self
    }
}

impl<A: SignalAnalyzer> EngineBuilder<A> {
    /// Swap in another analyzer
    pub fn analyzer<A2: SignalAnalyzer>(self, analyzer: A2) -> EngineBuilder<A2> {
        EngineBuilder {
            analyzer,
            config: self.config,
        }
    }

    pub fn max_workers(mut self, workers: usize) -> Self {
        self.config.max_workers = workers;
        self
    }

    pub fn window(mut self, window: FetchWindow) -> Self {
        self.config.window = window;
        self
    }

    /// Validate the configuration and start the worker pool
    pub fn build(self) -> Result<ScanEngine<A>, ScanError> {
        if self.config.max_workers == 0 {
            return Err(ParamsError::InvalidValue("max_workers must be > 0").into());
        }
        self.analyzer.validate_config()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers)
            .thread_name(|i| format!("vcpscan-worker-{i}"))
            .build()?;

        Ok(ScanEngine {
            analyzer: self.analyzer,
            config: self.config,
            pool,
        })
    }
}

// ============================================================
// TESTS
// ============================================================
