//! Runtime configuration from the environment
//!
//! The binary loads `.env` with `dotenvy` first, then calls
//! [`ScannerConfig::from_env`]. CLI flags override what is read here.

use std::path::Path;

use crate::params::DEFAULT_MAX_WORKERS;

pub const TELEGRAM_TOKEN_VAR: &str = "TELEGRAM_TOKEN";
pub const TELEGRAM_CHAT_ID_VAR: &str = "TELEGRAM_CHAT_ID";
pub const WORKERS_VAR: &str = "VCPSCAN_WORKERS";
pub const TICKERS_VAR: &str = "VCPSCAN_TICKERS";

/// Liquid IDX names scanned when no list is configured
const DEFAULT_TICKERS: [&str; 28] = [
    "ADRO.JK", "ANTM.JK", "ASII.JK", "BBCA.JK", "BBNI.JK", "BBRI.JK", "BBTN.JK", "BMRI.JK",
    "BRIS.JK", "BRMS.JK", "BREN.JK", "CPIN.JK", "GOTO.JK", "INKP.JK", "ITMG.JK", "KLBF.JK",
    "MDKA.JK", "MEDC.JK", "PGAS.JK", "PTBA.JK", "TINS.JK", "TLKM.JK", "UNTR.JK", "UNVR.JK",
    "PSAB.JK", "SGER.JK", "ACES.JK", "AMMN.JK",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bot credentials for Telegram delivery
#[derive(Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    pub tickers: Vec<String>,
    pub max_workers: usize,
    /// `None` when either credential is unset; delivery is then skipped
    pub telegram: Option<TelegramConfig>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            tickers: default_tickers(),
            max_workers: DEFAULT_MAX_WORKERS,
            telegram: None,
        }
    }
}

impl ScannerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let tickers = match get(TICKERS_VAR) {
            Some(list) => parse_ticker_list(&list),
            None => default_tickers(),
        };

        let max_workers = match get(WORKERS_VAR) {
            Some(raw) => parse_workers(&raw)?,
            None => DEFAULT_MAX_WORKERS,
        };

        let telegram = match (get(TELEGRAM_TOKEN_VAR), get(TELEGRAM_CHAT_ID_VAR)) {
            (Some(token), Some(chat_id)) => Some(TelegramConfig { token, chat_id }),
            _ => None,
        };

        Ok(Self {
            tickers,
            max_workers,
            telegram,
        })
    }

    /// Telegram credentials; names the token variable when either credential is unset
    pub fn require_telegram(&self) -> Result<&TelegramConfig, ConfigError> {
        self
            .telegram
            .as_ref()
            .ok_or(ConfigError::MissingEnvVar(TELEGRAM_TOKEN_VAR))
    }
}

pub fn default_tickers() -> Vec<String> {
    DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect()
}

/// Comma-separated list; blanks dropped, surrounding whitespace trimmed
pub fn parse_ticker_list(list: &str) -> Vec<String> {
    list
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// One ticker per line; blank lines and `#` comments skipped
pub fn load_tickers_file(path: impl AsRef<Path>) -> Result<Vec<String>, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    Ok(
        contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect(),
    )
}

fn parse_workers(raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            name: WORKERS_VAR,
            value: raw.to_string(),
        }),
    }
}
