//! Volatility contraction + accumulation analyzer
//!
//! A ticker is accepted when its recent trading range has coiled tight and the
//! latest session shows accumulation:
//!
//! - **Liquidity**: latest close and volume clear their floors.
//! - **Tightness**: `(max(high) - min(low)) / mean(close)` over the last 5 bars.
//! - **Entry score**: +40 close up, +30 volume above its 20-bar mean, +30 more
//!   when volume is above twice that mean.
//! - **Gap-up probability**: share of the last 30 sessions that opened above
//!   the prior close. Reported, never filtered on.
//!
//! Accepted when tightness < 6% and score >= 70; below 4% the setup is
//! `VCP_READY`, otherwise `ACCUM`.

use super::helpers::{gap_up_fraction, normalized_range, trailing_mean_volume};
use super::{AnalysisError, Signal, SignalAnalyzer, SignalStatus};
use crate::params::{ScanParams, PRICE_UP_POINTS, VOLUME_ABOVE_AVG_POINTS, VOLUME_SURGE_POINTS};
use crate::{OHLCVExt, ParamsError, OHLCV};

/// Intermediate values behind one analysis
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct VcpMetrics {
    pub last_close: f64,
    pub prev_close: f64,
    pub last_volume: f64,
    /// Trailing volume mean, latest bar included
    pub avg_volume: f64,
    /// `last_volume / avg_volume`, 0.0 when there was no volume
    pub volume_ratio: f64,
    pub tightness: f64,
    /// Percentage, 0..=100
    pub gap_probability: f64,
    pub entry_score: u8,
}

/// Additive entry score from the latest session.
///
/// Possible results are 0, 30, 40, 60, 70 and 100.
pub fn entry_score(
    last_close: f64,
    prev_close: f64,
    last_volume: f64,
    avg_volume: f64,
    surge_multiple: f64,
) -> u8 {
    let mut score = 0;
    if last_close > prev_close {
        score += PRICE_UP_POINTS;
    }
    if last_volume > avg_volume {
        score += VOLUME_ABOVE_AVG_POINTS;
        if last_volume > avg_volume * surge_multiple {
            score += VOLUME_SURGE_POINTS;
        }
    }
    score
}

/// VCP + accumulation screener
#[derive(Debug, Clone, Default)]
pub struct VcpAnalyzer {
    params: ScanParams,
}

impl VcpAnalyzer {
    pub fn new(params: ScanParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ScanParams {
        &self.params
    }

    /// Compute every metric at the latest bar, without applying any filter.
    ///
    /// Only the trailing [`ScanParams::lookback`] bars are read and validated.
    pub fn metrics<T: OHLCV>(&self, bars: &[T]) -> Result<VcpMetrics, AnalysisError> {
        let p = &self.params;
        let need = p.lookback();
        if bars.len() < need {
            return Err(AnalysisError::InsufficientData {
                need,
                got: bars.len(),
            });
        }

        let start = bars.len() - need;
        for (offset, bar) in bars[start..].iter().enumerate() {
            bar.validate().map_err(|reason| AnalysisError::InvalidBar {
                index: start + offset,
                reason,
            })?;
        }

        let last = &bars[bars.len() - 1];
        let prev = &bars[bars.len() - 2];

        let tightness = normalized_range(bars, p.tightness_window.get())
            .ok_or(AnalysisError::Degenerate("mean close over tightness window is zero"))?;
        let gap_fraction = gap_up_fraction(bars, p.gap_window.get()).ok_or(
            AnalysisError::InsufficientData {
                need: 2,
                got: bars.len(),
            },
        )?;
        let avg_volume = trailing_mean_volume(bars, p.volume_window.get()).ok_or(
            AnalysisError::InsufficientData {
                need: p.volume_window.get(),
                got: bars.len(),
            },
        )?;

        let volume_ratio = if avg_volume > 0.0 {
            last.volume() / avg_volume
        } else {
            0.0
        };

        Ok(VcpMetrics {
            last_close: last.close(),
            prev_close: prev.close(),
            last_volume: last.volume(),
            avg_volume,
            volume_ratio,
            tightness,
            gap_probability: gap_fraction * 100.0,
            entry_score: entry_score(
                last.close(),
                prev.close(),
                last.volume(),
                avg_volume,
                p.volume_surge_multiple,
            ),
        })
    }

    /// Acceptance rule; `None` when the metrics do not qualify
    pub fn classify(&self, metrics: &VcpMetrics) -> Option<SignalStatus> {
        let p = &self.params;
        if metrics.tightness >= p.max_tightness.get() || metrics.entry_score < p.min_entry_score {
            return None;
        }
        if metrics.tightness < p.vcp_ready_tightness.get() {
            Some(SignalStatus::VcpReady)
        } else {
            Some(SignalStatus::Accum)
        }
    }

    /// Latest close or volume below its floor. Non-finite values are left to
    /// bar validation.
    fn is_illiquid<T: OHLCV>(&self, last: &T) -> bool {
        last.close() < self.params.min_close || last.volume() < self.params.min_volume
    }
}

impl SignalAnalyzer for VcpAnalyzer {
    fn id(&self) -> &'static str {
        "VCP_ACCUM"
    }

    fn min_bars(&self) -> usize {
        self.params.min_bars.get()
    }

    fn validate_config(&self) -> Result<(), ParamsError> {
        self.params.validate()
    }

    fn try_analyze<T: OHLCV>(
        &self,
        ticker: &str,
        bars: &[T],
    ) -> Result<Option<Signal>, AnalysisError> {
        if bars.len() < self.min_bars() {
            return Ok(None);
        }

        if self.is_illiquid(&bars[bars.len() - 1]) {
            return Ok(None);
        }
        let metrics = self.metrics(bars)?;

        Ok(self.classify(&metrics).map(|status| {
            Signal::new(
                ticker,
                metrics.last_close.trunc() as i64,
                metrics.tightness,
                metrics.entry_score,
                metrics.gap_probability,
                status,
            )
        }))
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    /// 45 bars rising into a tight 5-bar range: the last five close at
    /// 149.6..=150.0 (mean 149.8) inside a 151.0 / 146.506 band, so the range
    /// is exactly 3% of the mean close. Volume is 200k except the last bar.
    fn vcp_series(last_close: f64, last_volume: f64) -> Vec<Bar> {
        let mut bars: Vec<Bar> = (0..40)
            .map(|i| {
                let c = 120.0 + i as f64 * 0.75;
                Bar::new(c - 0.75, c + 1.0, c - 1.0, c, 200_000.0)
            })
            .collect();
        let closes = [149.6, 149.7, 149.8, 149.9, last_close];
        for (i, &c) in closes.iter().enumerate() {
            let open = bars[bars.len() - 1].close;
            let volume = if i == closes.len() - 1 {
                last_volume
            } else {
                200_000.0
            };
            bars.push(Bar::new(open, 151.0, 146.506, c, volume));
        }
        bars
    }

    #[test]
    fn test_accepts_tight_range_with_volume_surge() {
        let bars = vcp_series(150.0, 500_000.0);
        let signal = VcpAnalyzer::default().analyze("BBCA.JK", &bars).unwrap();

        assert_eq!(signal.ticker(), "BBCA.JK");
        assert_eq!(signal.price(), 150);
        assert_eq!(signal.entry_score(), 100);
        assert!((signal.tightness() - 0.03).abs() < 1e-9);
        assert_eq!(format!("{:.1}%", signal.tightness_pct()), "3.0%");
        assert_eq!(signal.status(), SignalStatus::VcpReady);
    }

    #[test]
    fn test_rejects_flat_price_on_average_volume() {
        let bars = vcp_series(149.9, 200_000.0);
        let analyzer = VcpAnalyzer::default();

        let metrics = analyzer.metrics(&bars).unwrap();
        assert_eq!(metrics.entry_score, 0);
        assert!(analyzer.analyze("BBCA.JK", &bars).is_none());
    }

    #[test]
    fn test_short_history_is_skipped_not_faulted() {
        let bars = vcp_series(150.0, 500_000.0);
        let analyzer = VcpAnalyzer::default();
        assert_eq!(analyzer.try_analyze("X.JK", &bars[bars.len() - 39..]), Ok(None));
        assert!(analyzer.try_analyze("X.JK", &bars[bars.len() - 40..]).unwrap().is_some());
    }

    #[test]
    fn test_liquidity_floors() {
        let analyzer = VcpAnalyzer::default();

        let thin = vcp_series(150.0, 99_999.0);
        assert_eq!(analyzer.try_analyze("THIN.JK", &thin), Ok(None));

        let cheap: Vec<Bar> = vcp_series(150.0, 500_000.0)
            .into_iter()
            .map(|b| Bar::new(b.open / 2.0, b.high / 2.0, b.low / 2.0, b.close / 2.0, b.volume))
            .collect();
        assert_eq!(analyzer.try_analyze("CHEAP.JK", &cheap), Ok(None));
    }

    #[test]
    fn test_illiquid_ticker_with_bad_bars_is_screened_not_faulted() {
        let analyzer = VcpAnalyzer::default();

        let mut thin = vcp_series(150.0, 50_000.0);
        let n = thin.len();
        thin[n - 3].low = 200.0; // high < low
        assert_eq!(analyzer.try_analyze("THIN.JK", &thin), Ok(None));

        let mut liquid = vcp_series(150.0, 500_000.0);
        liquid[n - 3].low = 200.0;
        assert!(matches!(
            analyzer.try_analyze("BAD.JK", &liquid),
            Err(AnalysisError::InvalidBar { .. })
        ));
    }

    #[test]
    fn test_nan_latest_volume_is_a_fault() {
        let mut bars = vcp_series(150.0, 500_000.0);
        let n = bars.len();
        bars[n - 1].volume = f64::NAN;
        assert!(matches!(
            VcpAnalyzer::default().try_analyze("NAN.JK", &bars),
            Err(AnalysisError::InvalidBar { .. })
        ));
    }

    #[test]
    fn test_score_of_70_accepted_as_accum_when_range_wider() {
        // Close up (+40) and volume above average but short of a surge (+30)
        let mut bars = vcp_series(150.0, 300_000.0);
        let n = bars.len();
        for bar in &mut bars[n - 5..] {
            bar.low = 143.0; // (151 - 143) / 149.8 ~= 5.3%
        }

        let signal = VcpAnalyzer::default().analyze("ASII.JK", &bars).unwrap();
        assert_eq!(signal.entry_score(), 70);
        assert_eq!(signal.status(), SignalStatus::Accum);
    }

    #[test]
    fn test_rejects_loose_range_even_with_full_score() {
        let mut bars = vcp_series(150.0, 500_000.0);
        let n = bars.len();
        bars[n - 3].high = 160.0;

        let analyzer = VcpAnalyzer::default();
        assert_eq!(analyzer.metrics(&bars).unwrap().entry_score, 100);
        assert!(analyzer.analyze("LOOSE.JK", &bars).is_none());
    }

    #[test]
    fn test_volume_without_price_advance_is_not_enough() {
        // +30 +30 = 60 < 70
        let bars = vcp_series(149.0, 500_000.0);
        let analyzer = VcpAnalyzer::default();
        assert_eq!(analyzer.metrics(&bars).unwrap().entry_score, 60);
        assert!(analyzer.analyze("VOL.JK", &bars).is_none());
    }

    #[test]
    fn test_gap_probability_over_last_30_sessions() {
        let mut bars = vcp_series(150.0, 500_000.0);
        let n = bars.len();
        // Nudge 12 of the last 30 opens above the previous close
        for i in (n - 30..n).step_by(5) {
            bars[i].open = bars[i - 1].close + 0.1;
        }
        for i in (n - 29..n).step_by(5) {
            bars[i].open = bars[i - 1].close + 0.1;
        }

        let signal = VcpAnalyzer::default().analyze("GAP.JK", &bars).unwrap();
        assert!((signal.gap_probability_pct() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_nan_in_window_degrades_to_none() {
        let mut bars = vcp_series(150.0, 500_000.0);
        let n = bars.len();
        bars[n - 2].close = f64::NAN;

        let analyzer = VcpAnalyzer::default();
        assert_eq!(
            analyzer.try_analyze("NAN.JK", &bars),
            Err(AnalysisError::InvalidBar {
                index: n - 2,
                reason: "NaN in OHLCV"
            })
        );
        assert!(analyzer.analyze("NAN.JK", &bars).is_none());
    }

    #[test]
    fn test_bad_bar_outside_lookback_is_ignored() {
        let mut bars = vcp_series(150.0, 500_000.0);
        bars[0].high = f64::NAN;
        assert!(VcpAnalyzer::default().analyze("OLD.JK", &bars).is_some());
    }

    #[test]
    fn test_entry_score_components() {
        assert_eq!(entry_score(101.0, 100.0, 500.0, 100.0, 2.0), 100);
        assert_eq!(entry_score(101.0, 100.0, 150.0, 100.0, 2.0), 70);
        assert_eq!(entry_score(101.0, 100.0, 100.0, 100.0, 2.0), 40);
        assert_eq!(entry_score(100.0, 100.0, 500.0, 100.0, 2.0), 60);
        assert_eq!(entry_score(99.0, 100.0, 150.0, 100.0, 2.0), 30);
        assert_eq!(entry_score(99.0, 100.0, 50.0, 100.0, 2.0), 0);
        // Exactly twice the average is not a surge
        assert_eq!(entry_score(99.0, 100.0, 200.0, 100.0, 2.0), 30);
    }

    #[test]
    fn test_custom_thresholds() {
        let mut overrides = std::collections::HashMap::new();
        overrides.insert("max_tightness", 0.02);
        overrides.insert("vcp_ready_tightness", 0.01);
        let strict = VcpAnalyzer::new(ScanParams::with_params(&overrides).unwrap());

        let bars = vcp_series(150.0, 500_000.0);
        assert!(strict.analyze("BBCA.JK", &bars).is_none());
    }
}
