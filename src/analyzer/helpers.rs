//! Trailing-window helpers shared by analyzers
//!
//! Each helper returns the value of a rolling computation at the most recent
//! bar, i.e. over the last `period` bars. `None` means the series is shorter
//! than the window.

use crate::OHLCV;

/// Last `period` bars, or `None` if the series is too short
#[inline]
pub fn trailing<T>(bars: &[T], period: usize) -> Option<&[T]> {
    if period == 0 || bars.len() < period {
        return None;
    }
    Some(&bars[bars.len() - period..])
}

/// Highest high over the trailing window
pub fn trailing_max_high<T: OHLCV>(bars: &[T], period: usize) -> Option<f64> {
    trailing(bars, period).map(|w| w.iter().map(|b| b.high()).fold(f64::MIN, f64::max))
}

/// Lowest low over the trailing window
pub fn trailing_min_low<T: OHLCV>(bars: &[T], period: usize) -> Option<f64> {
    trailing(bars, period).map(|w| w.iter().map(|b| b.low()).fold(f64::MAX, f64::min))
}

/// Mean close over the trailing window
pub fn trailing_mean_close<T: OHLCV>(bars: &[T], period: usize) -> Option<f64> {
    trailing(bars, period).map(|w| w.iter().map(|b| b.close()).sum::<f64>() / w.len() as f64)
}

/// Mean volume over the trailing window, latest bar included
pub fn trailing_mean_volume<T: OHLCV>(bars: &[T], period: usize) -> Option<f64> {
    trailing(bars, period).map(|w| w.iter().map(|b| b.volume()).sum::<f64>() / w.len() as f64)
}

/// Normalized range: `(max(high) - min(low)) / mean(close)` over the window.
///
/// `None` when the window does not fit or the mean close is not positive.
pub fn normalized_range<T: OHLCV>(bars: &[T], period: usize) -> Option<f64> {
    let high = trailing_max_high(bars, period)?;
    let low = trailing_min_low(bars, period)?;
    let mean_close = trailing_mean_close(bars, period)?;
    (mean_close > 0.0).then(|| (high - low) / mean_close)
}

/// Fraction (0.0..=1.0) of the trailing `period` bars that opened above the
/// previous bar's close.
///
/// The first bar of the series has no previous close, so at most
/// `bars.len() - 1` bars are evaluated; the denominator is the count actually
/// evaluated.
pub fn gap_up_fraction<T: OHLCV>(bars: &[T], period: usize) -> Option<f64> {
    if bars.len() < 2 || period == 0 {
        return None;
    }
    let evaluated = period.min(bars.len() - 1);
    let start = bars.len() - evaluated;
    let gaps = (start..bars.len())
        .filter(|&i| bars[i].open() > bars[i - 1].close())
        .count();
    Some(gaps as f64 / evaluated as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar::new(o, h, l, c, 1_000.0)
    }

    #[test]
    fn test_trailing_window_bounds() {
        let bars = vec![1, 2, 3, 4, 5];
        assert_eq!(trailing(&bars, 2), Some(&[4, 5][..]));
        assert_eq!(trailing(&bars, 5), Some(&bars[..]));
        assert_eq!(trailing(&bars, 6), None);
        assert_eq!(trailing(&bars, 0), None);
    }

    #[test]
    fn test_normalized_range_uses_only_trailing_bars() {
        let bars = vec![
            bar(10.0, 500.0, 1.0, 10.0), // outside the window
            bar(100.0, 102.0, 98.0, 100.0),
            bar(100.0, 103.0, 99.0, 101.0),
            bar(101.0, 104.0, 97.0, 99.0),
        ];
        // (104 - 97) / mean(100, 101, 99)
        let range = normalized_range(&bars, 3).unwrap();
        assert!((range - 7.0 / 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalized_range_zero_close_is_none() {
        let bars = vec![bar(0.0, 0.0, 0.0, 0.0); 5];
        assert_eq!(normalized_range(&bars, 5), None);
    }

    #[test]
    fn test_mean_volume_includes_latest_bar() {
        let mut bars: Vec<Bar> = (0..4).map(|_| Bar::new(1.0, 1.0, 1.0, 1.0, 100.0)).collect();
        bars.push(Bar::new(1.0, 1.0, 1.0, 1.0, 600.0));
        assert_eq!(trailing_mean_volume(&bars, 5), Some(200.0));
        assert_eq!(trailing_mean_volume(&bars, 6), None);
    }

    #[test]
    fn test_gap_up_fraction() {
        let bars = vec![
            bar(100.0, 101.0, 99.0, 100.0),
            bar(101.0, 102.0, 100.0, 101.0), // gap up
            bar(100.0, 102.0, 99.0, 101.0),  // no gap
            bar(101.0, 102.0, 100.0, 101.5), // equal open is not a gap
            bar(102.0, 103.0, 101.0, 102.0), // gap up
        ];
        assert_eq!(gap_up_fraction(&bars, 4), Some(0.5));
        assert_eq!(gap_up_fraction(&bars, 1), Some(1.0));
    }

    #[test]
    fn test_gap_up_fraction_clamps_to_available_pairs() {
        let bars = vec![
            bar(100.0, 101.0, 99.0, 100.0),
            bar(101.0, 102.0, 100.0, 101.0),
            bar(100.0, 102.0, 99.0, 101.0),
        ];
        // Only two bars have a previous close
        assert_eq!(gap_up_fraction(&bars, 30), Some(0.5));
        assert_eq!(gap_up_fraction(&bars[..1], 30), None);
    }
}
