use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{select, BarSeriesProvider, FetchWindow, ProviderError};
use crate::BarSeries;

/// Reads bars from a JSON snapshot file.
///
/// The file maps tickers to ascending bar arrays:
///
/// ```json
/// { "BBCA.JK": [ { "open": 9000, "high": 9100, "low": 8950, "close": 9050, "volume": 1200000 } ] }
/// ```
///
/// The snapshot is returned as stored; the fetch window is not applied.
#[derive(Debug, Clone)]
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BarSeriesProvider for FileProvider {
    fn name(&self) -> &'static str {
        "file"
    }

    fn fetch(
        &self,
        tickers: &[String],
        _window: &FetchWindow,
    ) -> Result<HashMap<String, BarSeries>, ProviderError> {
        let raw = fs::read_to_string(&self.path)?;
        let all: HashMap<String, BarSeries> = serde_json::from_str(&raw)?;
        tracing::debug!(path = %self.path.display(), tickers = all.len(), "loaded bar snapshot");
        Ok(select(all, tickers))
    }
}
