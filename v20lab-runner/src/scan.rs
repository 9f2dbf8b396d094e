//! Scan pipeline: series → V20 signals → report → notifier.
//!
//! Loading and detection fan out over the worker pool; results are gathered
//! in universe order and delivered sequentially, so the notifier sees the
//! same messages in the same order as a single-threaded run.

use crate::config::{SeriesSource, V20Config};
use crate::error::RunError;
use crate::notify::Notifier;
use crate::pool::WorkerPool;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use v20lab_core::data::{DataError, DuplicatePolicy, PartitionSet, SeriesStore};
use v20lab_core::report::render_symbol_report;
use v20lab_core::{detect, Series, V20Signal};

/// Per-symbol scan result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolScan {
    pub symbol: String,
    /// Records inside the scan window.
    pub records: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub signals: Vec<V20Signal>,
    /// Rendered report, present only when some signal is actionable.
    pub report: Option<String>,
    pub error: Option<String>,
}

impl SymbolScan {
    pub fn actionable(&self) -> usize {
        self.signals.iter().filter(|s| s.is_actionable()).count()
    }
}

/// Result of one scan run, in universe order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub source: SeriesSource,
    pub since: Option<NaiveDate>,
    pub symbols: Vec<SymbolScan>,
    /// Reports the notifier accepted.
    pub delivered: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl ScanSummary {
    /// Symbols with no records in the window.
    pub fn empty(&self) -> usize {
        self.symbols
            .iter()
            .filter(|s| s.error.is_none() && s.records == 0)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.symbols.iter().filter(|s| s.error.is_some()).count()
    }

    pub fn signals(&self) -> usize {
        self.symbols.iter().map(|s| s.signals.len()).sum()
    }

    pub fn actionable(&self) -> usize {
        self.symbols.iter().map(|s| s.actionable()).sum()
    }

    /// Symbols that produced a report.
    pub fn reports(&self) -> impl Iterator<Item = (&str, &str)> {
        self.symbols
            .iter()
            .filter_map(|s| s.report.as_deref().map(|r| (s.symbol.as_str(), r)))
    }

    pub fn log_summary(&self) {
        tracing::info!(
            source = %self.source,
            symbols = self.symbols.len(),
            empty = self.empty(),
            failed = self.failed(),
            signals = self.signals(),
            actionable = self.actionable(),
            delivered = self.delivered,
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "scan finished"
        );
    }
}

/// Load, detect, and report every symbol, then hand reports to `notifier`.
pub fn scan(
    config: &V20Config,
    symbols: &[String],
    notifier: &dyn Notifier,
) -> Result<ScanSummary, RunError> {
    let started = Instant::now();
    let pool = WorkerPool::new(config.workers)?;
    let loader = SeriesLoader::new(config);

    tracing::info!(
        symbols = symbols.len(),
        workers = pool.workers(),
        source = %config.scan.source,
        since = ?config.scan.since,
        "starting scan"
    );

    let results = pool.map(symbols, |symbol| scan_symbol(config, &loader, symbol));

    let mut delivered = 0;
    for scan in &results {
        let Some(report) = &scan.report else {
            continue;
        };
        match notifier.notify(&scan.symbol, report) {
            Ok(()) => delivered += 1,
            Err(e) => tracing::warn!(
                symbol = %scan.symbol,
                notifier = notifier.name(),
                error = %e,
                "report delivery failed"
            ),
        }
    }

    let summary = ScanSummary {
        source: config.scan.source,
        since: config.scan.since,
        symbols: results,
        delivered,
        elapsed: started.elapsed(),
    };
    summary.log_summary();
    Ok(summary)
}

/// Reads series from whichever source the config selects.
enum SeriesLoader {
    Partitions(PartitionSet, DuplicatePolicy),
    Store(SeriesStore),
}

impl SeriesLoader {
    fn new(config: &V20Config) -> Self {
        match config.scan.source {
            SeriesSource::Partitions => Self::Partitions(
                PartitionSet::new(&config.data.partitions_dir),
                config.loader.duplicate_policy,
            ),
            SeriesSource::Store => Self::Store(SeriesStore::new(&config.data.store_dir)),
        }
    }

    fn load(&self, symbol: &str) -> Result<Series, DataError> {
        match self {
            Self::Partitions(set, policy) => {
                let (series, report) = set.load_series(symbol, *policy)?;
                if report.unreadable > 0 || !report.rejected.is_empty() {
                    tracing::warn!(
                        symbol,
                        unreadable = report.unreadable,
                        rejected = report.rejected.total(),
                        "series loaded with skipped data"
                    );
                }
                Ok(series)
            }
            Self::Store(store) => store.load(symbol),
        }
    }
}

fn scan_symbol(config: &V20Config, loader: &SeriesLoader, symbol: &str) -> SymbolScan {
    let mut result = SymbolScan {
        symbol: symbol.to_string(),
        records: 0,
        first_date: None,
        last_date: None,
        signals: Vec::new(),
        report: None,
        error: None,
    };

    let series = match loader.load(symbol) {
        Ok(series) => series,
        Err(e) => {
            tracing::warn!(symbol, error = %e, "failed to load series");
            result.error = Some(e.to_string());
            return result;
        }
    };
    let series = match config.scan.since {
        Some(start) => series.since(start),
        None => series,
    };

    result.records = series.len();
    result.first_date = series.first_date();
    result.last_date = series.last_date();
    if series.is_empty() {
        tracing::debug!(symbol, "no data in scan window");
        return result;
    }

    result.signals = detect(&series, &config.rules);
    result.report = render_symbol_report(&series, &result.signals);
    tracing::info!(
        symbol,
        records = result.records,
        signals = result.signals.len(),
        actionable = result.actionable(),
        "scanned symbol"
    );
    result
}
