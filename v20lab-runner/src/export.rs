//! Machine-readable export of scan results: JSON and CSV.
//!
//! The JSON document carries a `schema_version` for downstream readers.
//! Files are written atomically (`.tmp` then rename).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use v20lab_core::V20Signal;

use crate::config::SeriesSource;
use crate::scan::ScanSummary;

/// Current schema version for exported signal files.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalExport {
    pub schema_version: u32,
    pub generated_at: chrono::NaiveDateTime,
    pub source: SeriesSource,
    pub since: Option<NaiveDate>,
    pub signals: Vec<V20Signal>,
}

impl SignalExport {
    pub fn from_summary(summary: &ScanSummary) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: chrono::Local::now().naive_local(),
            source: summary.source,
            since: summary.since,
            signals: summary
                .symbols
                .iter()
                .flat_map(|s| s.signals.iter().cloned())
                .collect(),
        }
    }
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize every detected signal to pretty JSON.
pub fn export_json(summary: &ScanSummary) -> Result<String> {
    serde_json::to_string_pretty(&SignalExport::from_summary(summary))
        .context("failed to serialize signals to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export signals as CSV, one row per signal.
///
/// Columns: symbol, start_date, end_date, length, buy_price, sell_price,
/// gain_pct, buy_retest_date, buy_status, sell_retest_date, sell_status,
/// retest_interval_days, actionable
pub fn export_csv(signals: &[V20Signal]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "symbol",
        "start_date",
        "end_date",
        "length",
        "buy_price",
        "sell_price",
        "gain_pct",
        "buy_retest_date",
        "buy_status",
        "sell_retest_date",
        "sell_status",
        "retest_interval_days",
        "actionable",
    ])?;

    let opt_date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
    for s in signals {
        wtr.write_record([
            &s.symbol,
            &s.start_date.to_string(),
            &s.end_date.to_string(),
            &s.length.to_string(),
            &format!("{:.2}", s.buy_price),
            &format!("{:.2}", s.sell_price),
            &format!("{:.2}", s.gain_pct),
            &opt_date(s.buy_retest_date),
            &s.buy_status.to_string(),
            &opt_date(s.sell_retest_date),
            &s.sell_status.to_string(),
            &s.retest_interval_days()
                .map(|d| d.to_string())
                .unwrap_or_default(),
            &s.is_actionable().to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Files ──────────────────────────────────────────────────────────

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| {
        let _ = fs::remove_file(&tmp_path);
        format!("failed to move export into place at {}", path.display())
    })
}

/// Write the JSON export to `path`.
pub fn write_signals_json(path: &Path, summary: &ScanSummary) -> Result<()> {
    write_atomic(path, &export_json(summary)?)
}

/// Write the CSV export to `path`.
pub fn write_signals_csv(path: &Path, summary: &ScanSummary) -> Result<()> {
    let export = SignalExport::from_summary(summary);
    write_atomic(path, &export_csv(&export.signals)?)
}
