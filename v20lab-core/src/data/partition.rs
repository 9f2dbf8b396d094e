//! Date-partitioned snapshot files and the Series Loader.
//!
//! Layout: `{partitions_dir}/{YYYY-MM-DD}/{SYMBOL}.parquet`
//!
//! Each ingestion day gets its own directory holding whatever the fetch for
//! that day returned per symbol. Fetch windows overlap, so the same trading
//! day usually appears in several partitions; the loader folds them back
//! into one canonical series.

use super::canonicalize::{Canonicalizer, DuplicatePolicy, Ranked, RejectCounts};
use super::error::DataError;
use super::schema::{read_records, write_records};
use crate::domain::{DailyRecord, Series};
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

const PARTITION_DATE_FORMAT: &str = "%Y-%m-%d";

/// What the loader saw while assembling one series.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Partitions that had a file for the symbol and were read.
    pub partitions_read: usize,
    /// Partition files that existed but could not be read.
    pub unreadable: usize,
    /// Rows read across all partitions, before dedup.
    pub rows_read: usize,
    /// Rows folded away as same-date duplicates.
    pub duplicates_dropped: usize,
    /// Rows failing record validation.
    pub rejected: RejectCounts,
}

/// The set of daily snapshot partitions under one root directory.
#[derive(Debug, Clone)]
pub struct PartitionSet {
    root: PathBuf,
}

impl PartitionSet {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn partition_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join(date.format(PARTITION_DATE_FORMAT).to_string())
    }

    fn snapshot_path(&self, date: NaiveDate, symbol: &str) -> PathBuf {
        self.partition_dir(date).join(format!("{symbol}.parquet"))
    }

    /// Write one symbol's snapshot for an ingestion date.
    ///
    /// Writes are atomic: write to .tmp then rename. An empty record set
    /// writes nothing and returns `Ok(false)`.
    pub fn write_snapshot(
        &self,
        date: NaiveDate,
        symbol: &str,
        records: &[DailyRecord],
    ) -> Result<bool, DataError> {
        if records.is_empty() {
            return Ok(false);
        }

        let dir = self.partition_dir(date);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::Io(format!("create {}: {e}", dir.display())))?;

        let path = self.snapshot_path(date, symbol);
        let tmp_path = path.with_extension("parquet.tmp");
        write_records(records, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::Io(format!("atomic rename failed: {e}"))
        })?;

        tracing::debug!(symbol, %date, rows = records.len(), "wrote snapshot partition");
        Ok(true)
    }

    /// All partition dates present, ascending. Directories whose name is not
    /// a date are ignored; a missing root means no partitions.
    pub fn partition_dates(&self) -> Result<Vec<NaiveDate>, DataError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root)
            .map_err(|e| DataError::Io(format!("read dir {}: {e}", self.root.display())))?;

        let mut dates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::Io(format!("dir entry: {e}")))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            match NaiveDate::parse_from_str(&name, PARTITION_DATE_FORMAT) {
                Ok(date) => dates.push(date),
                Err(_) => tracing::debug!(dir = %name, "ignoring non-date partition directory"),
            }
        }
        dates.sort();
        Ok(dates)
    }

    /// Symbols with a snapshot in any partition, sorted and deduplicated.
    pub fn symbols(&self) -> Result<Vec<String>, DataError> {
        let mut symbols = Vec::new();
        for date in self.partition_dates()? {
            let Ok(entries) = fs::read_dir(self.partition_dir(date)) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    symbols.push(stem.to_string());
                }
            }
        }
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    /// Load the canonical series for `symbol` across every partition.
    ///
    /// Partitions without a file for the symbol are skipped; unreadable files
    /// are skipped with a warning. No data at all yields an empty series.
    pub fn load_series(
        &self,
        symbol: &str,
        policy: DuplicatePolicy,
    ) -> Result<(Series, LoadReport), DataError> {
        let mut report = LoadReport::default();
        let mut candidates = Vec::new();

        for (recency, date) in self.partition_dates()?.into_iter().enumerate() {
            let path = self.snapshot_path(date, symbol);
            if !path.exists() {
                continue;
            }
            match read_records(&path) {
                Ok(records) => {
                    tracing::debug!(symbol, partition = %date, rows = records.len(), "read partition");
                    report.partitions_read += 1;
                    report.rows_read += records.len();
                    candidates.extend(records.into_iter().map(|mut r| {
                        // Snapshot files are per symbol; the file name is authoritative.
                        r.symbol = symbol.to_string();
                        Ranked::new(r, recency as u32)
                    }));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable partition file");
                    report.unreadable += 1;
                }
            }
        }

        let (series, canonical) = Canonicalizer::into_series(symbol, candidates, policy);
        report.duplicates_dropped = canonical.duplicates_dropped;
        report.rejected = canonical.rejected;
        Ok((series, report))
    }
}
