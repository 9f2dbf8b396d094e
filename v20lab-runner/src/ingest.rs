//! Ingest pipeline: feed → normalized records → day snapshot → Series Store.
//!
//! Each symbol is one task on the worker pool. Workers write their own
//! snapshot file; the store merge is serialized by the store's commit lock.
//! A failure for one symbol never aborts the others.

use crate::config::V20Config;
use crate::error::RunError;
use crate::pool::WorkerPool;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use v20lab_core::data::{
    FeedBatch, FeedError, FeedSource, MergeReport, PartitionSet, RejectCounts, RowNormalizer,
    SeriesStore,
};

/// Pipeline step a symbol failed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Fetch,
    Snapshot,
    Merge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SymbolOutcome {
    /// Records were merged into the store.
    Merged { report: MergeReport },
    /// The feed had nothing usable for this symbol.
    NoData,
    Failed { stage: IngestStage, error: String },
}

/// Per-symbol ingest result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolIngest {
    pub symbol: String,
    /// Raw rows returned by the feed.
    pub rows: usize,
    /// Rows that normalized into valid records.
    pub records: usize,
    /// Rows skipped for belonging to another instrument series.
    pub other_series: usize,
    pub rejected: RejectCounts,
    pub snapshot_written: bool,
    pub outcome: SymbolOutcome,
}

impl SymbolIngest {
    fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            rows: 0,
            records: 0,
            other_series: 0,
            rejected: RejectCounts::default(),
            snapshot_written: false,
            outcome: SymbolOutcome::NoData,
        }
    }

    fn failed(mut self, stage: IngestStage, error: impl ToString) -> Self {
        self.outcome = SymbolOutcome::Failed {
            stage,
            error: error.to_string(),
        };
        self
    }
}

/// Result of one ingest run, in universe order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSummary {
    pub date: NaiveDate,
    pub symbols: Vec<SymbolIngest>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl IngestSummary {
    pub fn merged(&self) -> usize {
        self.symbols
            .iter()
            .filter(|s| matches!(s.outcome, SymbolOutcome::Merged { .. }))
            .count()
    }

    pub fn no_data(&self) -> usize {
        self.symbols
            .iter()
            .filter(|s| s.outcome == SymbolOutcome::NoData)
            .count()
    }

    pub fn failures(&self) -> Vec<&SymbolIngest> {
        self.symbols
            .iter()
            .filter(|s| matches!(s.outcome, SymbolOutcome::Failed { .. }))
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures().is_empty()
    }

    /// Symbols whose day snapshot was written but whose store merge failed.
    /// Partitions and store disagree for these until they are re-ingested.
    pub fn unmerged_snapshots(&self) -> Vec<&str> {
        self.symbols
            .iter()
            .filter(|s| {
                s.snapshot_written
                    && matches!(
                        s.outcome,
                        SymbolOutcome::Failed {
                            stage: IngestStage::Merge,
                            ..
                        }
                    )
            })
            .map(|s| s.symbol.as_str())
            .collect()
    }

    /// Records newly inserted into the store across all symbols.
    pub fn inserted(&self) -> usize {
        self.merge_reports().map(|r| r.inserted).sum()
    }

    pub fn updated(&self) -> usize {
        self.merge_reports().map(|r| r.updated).sum()
    }

    pub fn rejected(&self) -> usize {
        self.symbols.iter().map(|s| s.rejected.total()).sum()
    }

    fn merge_reports(&self) -> impl Iterator<Item = &MergeReport> {
        self.symbols.iter().filter_map(|s| match &s.outcome {
            SymbolOutcome::Merged { report } => Some(report),
            _ => None,
        })
    }

    pub fn log_summary(&self) {
        tracing::info!(
            date = %self.date,
            symbols = self.symbols.len(),
            merged = self.merged(),
            no_data = self.no_data(),
            failed = self.failures().len(),
            unmerged_snapshots = self.unmerged_snapshots().len(),
            inserted = self.inserted(),
            updated = self.updated(),
            rejected = self.rejected(),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "ingest finished"
        );
    }
}

/// Fetch, snapshot, and merge every symbol for ingestion date `date`.
pub fn ingest(
    config: &V20Config,
    feed: &dyn FeedSource,
    date: NaiveDate,
    symbols: &[String],
) -> Result<IngestSummary, RunError> {
    let started = Instant::now();
    let pool = WorkerPool::new(config.workers)?;
    let partitions = PartitionSet::new(&config.data.partitions_dir);
    let store = SeriesStore::new(&config.data.store_dir);
    let normalizer = config.ingest.normalizer();

    tracing::info!(
        %date,
        symbols = symbols.len(),
        workers = pool.workers(),
        feed = feed.name(),
        "starting ingest"
    );

    let results = pool.map(symbols, |symbol| {
        ingest_symbol(feed, &normalizer, &partitions, &store, date, symbol)
    });

    let summary = IngestSummary {
        date,
        symbols: results,
        elapsed: started.elapsed(),
    };
    summary.log_summary();
    Ok(summary)
}

fn ingest_symbol(
    feed: &dyn FeedSource,
    normalizer: &RowNormalizer,
    partitions: &PartitionSet,
    store: &SeriesStore,
    date: NaiveDate,
    symbol: &str,
) -> SymbolIngest {
    let mut result = SymbolIngest::new(symbol);

    let rows = match feed.fetch(symbol) {
        Ok(rows) => rows,
        Err(FeedError::SymbolNotFound { .. }) => {
            tracing::warn!(symbol, "feed has no data for symbol");
            return result;
        }
        Err(e) => {
            tracing::warn!(symbol, error = %e, "feed fetch failed");
            return result.failed(IngestStage::Fetch, e);
        }
    };

    let batch = FeedBatch::from_rows(symbol, &rows, normalizer);
    result.rows = rows.len();
    result.records = batch.records.len();
    result.other_series = batch.other_series;
    result.rejected = batch.rejected;
    if batch.records.is_empty() {
        tracing::debug!(symbol, rows = result.rows, "no usable rows");
        return result;
    }

    match partitions.write_snapshot(date, symbol, &batch.records) {
        Ok(written) => result.snapshot_written = written,
        Err(e) => {
            tracing::warn!(symbol, error = %e, "snapshot write failed");
            return result.failed(IngestStage::Snapshot, e);
        }
    }

    match store.upsert(batch.records) {
        Ok(report) => {
            tracing::debug!(
                symbol,
                inserted = report.inserted,
                updated = report.updated,
                "merged into store"
            );
            result.outcome = SymbolOutcome::Merged { report };
            result
        }
        Err(e) => {
            tracing::warn!(
                symbol,
                error = %e,
                snapshot_written = result.snapshot_written,
                "store merge failed; snapshot partition is ahead of the store until re-ingest"
            );
            result.failed(IngestStage::Merge, e)
        }
    }
}
