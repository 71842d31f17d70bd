use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use vcpscan::config::{load_tickers_file, parse_ticker_list, ScannerConfig};
use vcpscan::logging::init_logging;
use vcpscan::prelude::*;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Comma-separated tickers (e.g. "BBCA.JK,TLKM.JK"); overrides VCPSCAN_TICKERS
    #[arg(long, conflicts_with = "tickers_file")]
    tickers: Option<String>,

    /// File with one ticker per line
    #[arg(long)]
    tickers_file: Option<PathBuf>,

    /// Read bars from a JSON snapshot instead of Yahoo Finance
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Concurrent analysis workers; overrides VCPSCAN_WORKERS
    #[arg(long)]
    workers: Option<usize>,

    /// Report format printed to stdout: text or json
    #[arg(long, default_value = "text")]
    format: ReportFormat,

    /// Skip Telegram delivery
    #[arg(long)]
    no_notify: bool,

    /// History to fetch, e.g. 3mo, 90d, 1y
    #[arg(long, default_value = "3mo")]
    lookback: Lookback,

    /// Bar interval: 1d or 1wk
    #[arg(long, default_value = "1d")]
    interval: Interval,

    /// Override a scan parameter, e.g. --set max_tightness=0.05
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_key_val)]
    overrides: Vec<(String, f64)>,
}

fn parse_key_val(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid number in `{s}`"))?;
    Ok((key.trim().to_string(), value))
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "scan failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = ScannerConfig::from_env()?;
    if let Some(list) = &cli.tickers {
        config.tickers = parse_ticker_list(list);
    }
    if let Some(path) = &cli.tickers_file {
        config.tickers = load_tickers_file(path)?;
    }
    if let Some(workers) = cli.workers {
        config.max_workers = workers;
    }

    let overrides: HashMap<&str, f64> = cli
        .overrides
        .iter()
        .map(|(k, v)| (k.as_str(), *v))
        .collect();
    let params = ScanParams::with_params(&overrides)?;

    let engine = EngineBuilder::new()
        .params(params)
        .max_workers(config.max_workers)
        .window(FetchWindow {
            lookback: cli.lookback,
            interval: cli.interval,
        })
        .build()?;

    let provider: Box<dyn BarSeriesProvider> = match &cli.snapshot {
        Some(path) => Box::new(FileProvider::new(path.clone())),
        None => Box::new(YahooProvider::new()?),
    };

    info!(
        tickers = config.tickers.len(),
        workers = config.max_workers,
        provider = provider.name(),
        "starting scan"
    );
    let result = engine.run(&config.tickers, provider.as_ref())?;

    let now = chrono::Local::now();
    let report = ScanReport::new(&result, now);
    deliver(&ConsoleSink::stdout(), "stdout", &report.render(cli.format));

    if cli.no_notify {
        return Ok(());
    }
    match config.require_telegram() {
        Ok(telegram) => match TelegramSink::new(telegram.token.clone()) {
            Ok(sink) => {
                deliver(&sink, &telegram.chat_id, &report.to_text());
            }
            Err(e) => warn!(error = %e, "telegram client unavailable, report not sent"),
        },
        Err(e) => info!(reason = %e, "telegram delivery skipped"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "vcpscan",
            "--tickers",
            "BBCA.JK,TLKM.JK",
            "--workers",
            "4",
            "--format",
            "json",
            "--no-notify",
            "--lookback",
            "6mo",
            "--interval",
            "1wk",
            "--set",
            "max_tightness=0.05",
        ])
        .unwrap();

        assert_eq!(cli.tickers.as_deref(), Some("BBCA.JK,TLKM.JK"));
        assert_eq!(cli.workers, Some(4));
        assert_eq!(cli.format, ReportFormat::Json);
        assert!(cli.no_notify);
        assert_eq!(cli.lookback, Lookback::Months(6));
        assert_eq!(cli.interval, Interval::Weekly);
        assert_eq!(cli.overrides, vec![("max_tightness".to_string(), 0.05)]);
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["vcpscan"]).unwrap();
        assert_eq!(cli.format, ReportFormat::Text);
        assert_eq!(cli.lookback, Lookback::Months(3));
        assert_eq!(cli.interval, Interval::Daily);
        assert!(cli.overrides.is_empty());
    }

    #[test]
    fn test_tickers_and_file_conflict() {
        assert!(Cli::try_parse_from(["vcpscan", "--tickers", "A", "--tickers-file", "t.txt"]).is_err());
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(parse_key_val("min_close=50"), Ok(("min_close".to_string(), 50.0)));
        assert!(parse_key_val("min_close").is_err());
        assert!(parse_key_val("min_close=lots").is_err());
    }
}
