//! Policy constants and tunable scan parameters
//!
//! Every threshold the analyzer applies is a named constant here, collected
//! into [`ScanParams`]. `ScanParams::default()` is the fixed screening policy;
//! overrides go through [`ScanParams::with_params`], which validates each value
//! against its [`ParamMeta`].
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use vcpscan::params::ScanParams;
//!
//! for param in ScanParams::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//!
//! let mut overrides = HashMap::new();
//! overrides.insert("max_tightness", 0.05);
//! let params = ScanParams::with_params(&overrides).unwrap();
//! assert_eq!(params.max_tightness.get(), 0.05);
//! ```

use std::collections::HashMap;

use crate::{ParamsError, Period, Ratio};

// ============================================================
// POLICY CONSTANTS
// ============================================================

/// Minimum history required before a ticker is analyzed
pub const MIN_BARS: usize = 40;
/// Trailing bars used for the high-low tightness range
pub const TIGHTNESS_WINDOW: usize = 5;
/// Trailing bars used for the gap-up frequency
pub const GAP_WINDOW: usize = 30;
/// Trailing bars in the volume moving average
pub const VOLUME_MA_WINDOW: usize = 20;

/// Liquidity floor on the latest close (currency units)
pub const MIN_CLOSE: f64 = 100.0;
/// Liquidity floor on the latest volume (shares)
pub const MIN_VOLUME: f64 = 100_000.0;

/// Tightness must be strictly below this to accept
pub const MAX_TIGHTNESS: f64 = 0.06;
/// Accepted tickers tighter than this are VCP_READY, the rest ACCUM
pub const VCP_READY_TIGHTNESS: f64 = 0.04;
/// Entry score needed to accept
pub const MIN_ENTRY_SCORE: u8 = 70;

/// Points for latest close above previous close
pub const PRICE_UP_POINTS: u8 = 40;
/// Points for latest volume above its moving average
pub const VOLUME_ABOVE_AVG_POINTS: u8 = 30;
/// Extra points when latest volume exceeds the surge multiple of its average
pub const VOLUME_SURGE_POINTS: u8 = 30;
/// Volume / average ratio that counts as a surge
pub const VOLUME_SURGE_MULTIPLE: f64 = 2.0;

/// Concurrent analysis tasks per run
pub const DEFAULT_MAX_WORKERS: usize = 20;

// ============================================================
// PARAMETER METADATA
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Ratio value (0.0..=1.0)
  Ratio,
  /// Period value (positive integer)
  Period,
  /// Absolute non-negative threshold (price, volume, multiple)
  Threshold,
  /// Integer score in 0..=100
  Score,
}

/// Metadata for a single scan parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "max_tightness")
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Accepted range: (min, max), inclusive
  pub range: (f64, f64),
  /// Human-readable description
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn new(
    name: &'static str,
    param_type: ParamType,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type, default, range, description }
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<(), ParamsError> {
    if !value.is_finite() {
      return Err(ParamsError::InvalidValue("parameter must be finite"));
    }
    let (min, max) = self.range;
    if value < min || value > max {
      return Err(ParamsError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Period | ParamType::Score if value.fract() != 0.0 => {
        Err(ParamsError::InvalidValue("Period and Score parameters must be integers"))
      },
      _ => Ok(()),
    }
  }
}

static PARAM_META: [ParamMeta; 10] = [
  ParamMeta::new(
    "min_bars",
    ParamType::Period,
    MIN_BARS as f64,
    (2.0, 1000.0),
    "Minimum history length; shorter series are skipped",
  ),
  ParamMeta::new(
    "tightness_window",
    ParamType::Period,
    TIGHTNESS_WINDOW as f64,
    (1.0, 250.0),
    "Trailing bars in the high-low tightness range",
  ),
  ParamMeta::new(
    "gap_window",
    ParamType::Period,
    GAP_WINDOW as f64,
    (1.0, 250.0),
    "Trailing bars in the gap-up frequency",
  ),
  ParamMeta::new(
    "volume_window",
    ParamType::Period,
    VOLUME_MA_WINDOW as f64,
    (1.0, 250.0),
    "Trailing bars in the volume moving average",
  ),
  ParamMeta::new(
    "min_close",
    ParamType::Threshold,
    MIN_CLOSE,
    (0.0, 1e9),
    "Liquidity floor on the latest close",
  ),
  ParamMeta::new(
    "min_volume",
    ParamType::Threshold,
    MIN_VOLUME,
    (0.0, 1e15),
    "Liquidity floor on the latest volume",
  ),
  ParamMeta::new(
    "max_tightness",
    ParamType::Ratio,
    MAX_TIGHTNESS,
    (0.0, 1.0),
    "Tightness must be below this to accept",
  ),
  ParamMeta::new(
    "vcp_ready_tightness",
    ParamType::Ratio,
    VCP_READY_TIGHTNESS,
    (0.0, 1.0),
    "Accepted tickers below this tightness are VCP_READY",
  ),
  ParamMeta::new(
    "min_entry_score",
    ParamType::Score,
    MIN_ENTRY_SCORE as f64,
    (0.0, 100.0),
    "Entry score needed to accept",
  ),
  ParamMeta::new(
    "volume_surge_multiple",
    ParamType::Threshold,
    VOLUME_SURGE_MULTIPLE,
    (1.0, 100.0),
    "Volume / average ratio that earns the surge bonus",
  ),
];

// ============================================================
// SCAN PARAMETERS
// ============================================================

/// Thresholds and window sizes applied by the analyzer
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScanParams {
  pub min_bars: Period,
  pub tightness_window: Period,
  pub gap_window: Period,
  pub volume_window: Period,
  pub min_close: f64,
  pub min_volume: f64,
  pub max_tightness: Ratio,
  pub vcp_ready_tightness: Ratio,
  pub min_entry_score: u8,
  pub volume_surge_multiple: f64,
}

impl Default for ScanParams {
  fn default() -> Self {
    Self {
      min_bars: Period::new_const(MIN_BARS),
      tightness_window: Period::new_const(TIGHTNESS_WINDOW),
      gap_window: Period::new_const(GAP_WINDOW),
      volume_window: Period::new_const(VOLUME_MA_WINDOW),
      min_close: MIN_CLOSE,
      min_volume: MIN_VOLUME,
      max_tightness: Ratio::new_const(MAX_TIGHTNESS),
      vcp_ready_tightness: Ratio::new_const(VCP_READY_TIGHTNESS),
      min_entry_score: MIN_ENTRY_SCORE,
      volume_surge_multiple: VOLUME_SURGE_MULTIPLE,
    }
  }
}

impl ScanParams {
  /// Metadata for all configurable parameters
  pub fn param_meta() -> &'static [ParamMeta] {
    &PARAM_META
  }

  /// Build parameters from name/value overrides.
  ///
  /// Missing parameters use their defaults; unknown names are rejected.
  pub fn with_params(params: &HashMap<&str, f64>) -> Result<Self, ParamsError> {
    if let Some(unknown) = params.keys().find(|k| !PARAM_META.iter().any(|m| m.name == **k)) {
      return Err(ParamsError::InvalidConfig(format!("unknown parameter `{unknown}`")));
    }

    let value = |name: &'static str| -> Result<f64, ParamsError> {
      let meta = PARAM_META
        .iter()
        .find(|m| m.name == name)
        .ok_or_else(|| ParamsError::InvalidConfig(format!("no metadata for `{name}`")))?;
      let v = params.get(name).copied().unwrap_or(meta.default);
      meta.validate(v)?;
      Ok(v)
    };

    let scan = Self {
      min_bars: Period::new(value("min_bars")? as usize)?,
      tightness_window: Period::new(value("tightness_window")? as usize)?,
      gap_window: Period::new(value("gap_window")? as usize)?,
      volume_window: Period::new(value("volume_window")? as usize)?,
      min_close: value("min_close")?,
      min_volume: value("min_volume")?,
      max_tightness: Ratio::new(value("max_tightness")?)?,
      vcp_ready_tightness: Ratio::new(value("vcp_ready_tightness")?)?,
      min_entry_score: value("min_entry_score")? as u8,
      volume_surge_multiple: value("volume_surge_multiple")?,
    };
    scan.validate()?;
    Ok(scan)
  }

  /// Bars the analyzer reads back from the latest one.
  ///
  /// Gap-up and price-change checks compare against the previous close, so
  /// they need one bar beyond their window.
  pub fn lookback(&self) -> usize {
    self
      .tightness_window
      .get()
      .max(self.volume_window.get())
      .max(self.gap_window.get() + 1)
      .max(2)
  }

  /// Cross-field consistency checks
  pub fn validate(&self) -> Result<(), ParamsError> {
    if self.vcp_ready_tightness > self.max_tightness {
      return Err(ParamsError::InvalidConfig(format!(
        "vcp_ready_tightness ({}) must not exceed max_tightness ({})",
        self.vcp_ready_tightness.get(),
        self.max_tightness.get()
      )));
    }
    if self.min_bars.get() < self.lookback() {
      return Err(ParamsError::InvalidConfig(format!(
        "min_bars ({}) is shorter than the {} bars the windows need",
        self.min_bars.get(),
        self.lookback()
      )));
    }
    if self.min_entry_score > 100 {
      return Err(ParamsError::OutOfRange {
        field: "min_entry_score",
        value: self.min_entry_score as f64,
        min: 0.0,
        max: 100.0,
      });
    }
    if !self.min_close.is_finite() || self.min_close < 0.0 {
      return Err(ParamsError::InvalidValue("min_close must be finite and >= 0"));
    }
    if !self.min_volume.is_finite() || self.min_volume < 0.0 {
      return Err(ParamsError::InvalidValue("min_volume must be finite and >= 0"));
    }
    if !self.volume_surge_multiple.is_finite() || self.volume_surge_multiple < 1.0 {
      return Err(ParamsError::InvalidValue("volume_surge_multiple must be >= 1"));
    }
    Ok(())
  }
}

// ============================================================
// TESTS
// ============================================================
