//! Report rendering for scan results
//!
//! - Text: title, timestamp and an aligned table (console and chat)
//! - JSON: machine-readable signal list

use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::{DateTime, TimeZone};
use serde::Serialize;

use crate::analyzer::Signal;
use crate::engine::ScanResult;

/// Report title line
pub const REPORT_TITLE: &str = "BSJP SCANNER (VCP + ACCUM)";
/// Rendered instead of a table when nothing matched
pub const NO_MATCHES_MESSAGE: &str = "No stocks matched the VCP criteria today.";
/// chrono format of the header timestamp, e.g. `17 Oct 2026 | 16:05`
pub const TIMESTAMP_FORMAT: &str = "%d %b %Y | %H:%M";

const COLUMNS: [&str; 6] = ["Ticker", "Price", "Tight", "Entry", "GP_Prob", "Status"];

// ============================================================
// REPORT FORMAT
// ============================================================

/// Supported report formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Aligned plain-text table
    #[default]
    Text,
    /// JSON document
    Json,
}

impl Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown report format: {s}")),
        }
    }
}

// ============================================================
// SCAN REPORT
// ============================================================

/// A scan result stamped with the time it was produced
pub struct ScanReport<'a, Tz: TimeZone> {
    result: &'a ScanResult,
    timestamp: DateTime<Tz>,
}

impl<'a, Tz> ScanReport<'a, Tz>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    pub fn new(result: &'a ScanResult, timestamp: DateTime<Tz>) -> Self {
        Self { result, timestamp }
    }

    pub fn render(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Text => self.to_text(),
            ReportFormat::Json => self.to_json(),
        }
    }

    /// Title, timestamp and the ranked table, or the no-matches message
    pub fn to_text(&self) -> String {
        let ranked = self.result.ranked();
        if ranked.is_empty() {
            return NO_MATCHES_MESSAGE.to_string();
        }

        let mut out = String::new();
        out.push_str(REPORT_TITLE);
        out.push('\n');
        out.push_str(&self.timestamp.format(TIMESTAMP_FORMAT).to_string());
        out.push_str("\n\n");
        out.push_str(&render_table(&ranked));
        out
    }

    pub fn to_json(&self) -> String {
        let payload = JsonReport {
            title: REPORT_TITLE,
            generated_at: self.timestamp.to_rfc3339(),
            signals: self.result.ranked(),
        };
        // infallible: no maps with non-string keys
        serde_json::to_string_pretty(&payload).unwrap_or_default()
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    title: &'a str,
    generated_at: String,
    signals: Vec<&'a Signal>,
}

/// Render a scan result as text
pub fn format_report<Tz>(results: &ScanResult, timestamp: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    ScanReport::new(results, timestamp.clone()).to_text()
}

// ============================================================
// TABLE
// ============================================================

fn row(signal: &Signal) -> [String; 6] {
    [
        signal.display_ticker().to_string(),
        signal.price().to_string(),
        format!("{:.1}%", signal.tightness_pct()),
        format!("{}%", signal.entry_score()),
        format!("{:.0}%", signal.gap_probability_pct()),
        signal.status().to_string(),
    ]
}

/// Text columns are left-aligned, numeric ones right-aligned
fn render_table(signals: &[&Signal]) -> String {
    let rows: Vec<[String; 6]> = signals.iter().map(|s| row(s)).collect();

    let mut widths = COLUMNS.map(str::len);
    for r in &rows {
        for (w, cell) in widths.iter_mut().zip(r) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = format_line(&COLUMNS, &widths);
    for r in &rows {
        let cells: Vec<&str> = r.iter().map(String::as_str).collect();
        out.push('\n');
        out.push_str(&format_line(&cells, &widths));
    }
    out
}

fn format_line(cells: &[&str], widths: &[usize]) -> String {
    let last = cells.len().saturating_sub(1);
    cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(col, (cell, &width))| {
            if col == 0 || col == last {
                format!("{cell:<width$}")
            } else {
                format!("{cell:>width$}")
            }
        })
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::SignalStatus;
    use chrono::{FixedOffset, Utc};

    fn signal(ticker: &str, score: u8, tightness: f64, gap: f64) -> Signal {
        let status = if tightness < 0.04 {
            SignalStatus::VcpReady
        } else {
            SignalStatus::Accum
        };
        Signal::new(ticker, 1234, tightness, score, gap, status)
    }

    fn stamp() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 16, 16, 5, 0)
            .unwrap()
    }

    #[test]
    fn test_empty_result_renders_no_matches() {
        let result = ScanResult::default();
        assert_eq!(format_report(&result, &Utc::now()), NO_MATCHES_MESSAGE);
    }

    #[test]
    fn test_header_and_timestamp() {
        let result = ScanResult::new(vec![signal("BBCA.JK", 100, 0.03, 40.0)], 1, 1, 0);
        let text = format_report(&result, &stamp());
        let mut lines = text.lines();

        assert_eq!(lines.next(), Some(REPORT_TITLE));
        assert_eq!(lines.next(), Some("16 Oct 2026 | 16:05"));
        assert_eq!(lines.next(), Some(""));
        assert_eq!(
            lines.next(),
            Some("Ticker  Price  Tight  Entry  GP_Prob  Status")
        );
        assert_eq!(
            lines.next(),
            Some("BBCA     1234   3.0%   100%      40%  VCP_READY")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_rows_sorted_by_entry_score() {
        let result = ScanResult::new(
            vec![
                signal("AAA.JK", 40, 0.05, 10.0),
                signal("BBB.JK", 100, 0.03, 20.0),
                signal("CCC.JK", 70, 0.05, 30.0),
            ],
            3,
            3,
            0,
        );
        let text = format_report(&result, &stamp());
        let tickers: Vec<&str> = text
            .lines()
            .skip(4)
            .map(|l| l.split_whitespace().next().unwrap())
            .collect();
        assert_eq!(tickers, vec!["BBB", "CCC", "AAA"]);
    }

    #[test]
    fn test_cells_rounded_for_display() {
        let cells = row(&signal("TLKM.JK", 70, 0.04567, 56.666));
        assert_eq!(cells[2], "4.6%");
        assert_eq!(cells[3], "70%");
        assert_eq!(cells[4], "57%");
        assert_eq!(cells[5], "ACCUM");
    }

    #[test]
    fn test_json_report() {
        let result = ScanResult::new(
            vec![signal("AAA.JK", 70, 0.05, 10.0), signal("BBB.JK", 100, 0.03, 20.0)],
            2,
            2,
            0,
        );
        let json = ScanReport::new(&result, stamp()).render(ReportFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["title"], REPORT_TITLE);
        assert_eq!(value["generated_at"], "2026-10-16T16:05:00+07:00");
        assert_eq!(value["signals"][0]["ticker"], "BBB.JK");
        assert_eq!(value["signals"][0]["status"], "VCP_READY");
        assert_eq!(value["signals"][1]["entry_score"], 70);
    }

    #[test]
    fn test_report_format_parse() {
        assert_eq!("json".parse::<ReportFormat>(), Ok(ReportFormat::Json));
        assert_eq!("TEXT".parse::<ReportFormat>(), Ok(ReportFormat::Text));
        assert!("markdown".parse::<ReportFormat>().is_err());
    }
}
