//! Series Store: the persisted, deduplicated source of truth.
//!
//! Layout: `{store_dir}/symbol={SYMBOL}/{year}.parquet`
//!
//! Features:
//! - Insert-or-update keyed on (symbol, date)
//! - In-batch duplicates resolved by highest turnover, then field order
//! - Staged writes (`.tmp`) committed by rename, previous files kept as
//!   `.bak` until the whole batch lands, rolled back otherwise
//! - One commit lock per store, so concurrent upserts never interleave
//! - Metadata sidecar per symbol (hash, date range, record count)

use super::canonicalize::{Canonicalizer, DuplicatePolicy, Ranked, RejectCounts};
use super::error::{DataError, MergeFailure};
use super::schema::{read_records, write_records};
use crate::domain::{DailyRecord, Series};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Metadata sidecar for a stored symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub record_count: usize,
    pub data_hash: String,
    pub updated_at: chrono::NaiveDateTime,
}

/// Outcome of one [`SeriesStore::upsert`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Candidates handed in.
    pub received: usize,
    /// Candidates dropped by validation, by reason.
    pub invalid: RejectCounts,
    /// Valid candidates that lost an in-batch duplicate contest.
    pub duplicates: usize,
    /// Keys that did not exist before.
    pub inserted: usize,
    /// Existing keys whose columns changed.
    pub updated: usize,
    /// Existing keys already holding identical values.
    pub unchanged: usize,
    /// Symbols with at least one insert or update, sorted.
    pub symbols: Vec<String>,
}

impl MergeReport {
    /// True when the batch changed nothing on disk.
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.updated == 0
    }
}

/// Stored state for a single symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStatus {
    pub symbol: String,
    pub stored: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub record_count: Option<usize>,
}

/// A partition rewritten in staging, waiting for commit.
#[derive(Debug)]
struct StagedPartition {
    tmp_path: PathBuf,
    path: PathBuf,
}

/// The Series Store.
pub struct SeriesStore {
    store_dir: PathBuf,
    commit_lock: Mutex<()>,
}

impl SeriesStore {
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
            commit_lock: Mutex::new(()),
        }
    }

    /// Root directory of the store.
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Directory for a specific symbol: `{store_dir}/symbol={SYMBOL}/`
    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.store_dir.join(format!("symbol={symbol}"))
    }

    fn year_path(&self, symbol: &str, year: i32) -> PathBuf {
        self.symbol_dir(symbol).join(format!("{year}.parquet"))
    }

    fn meta_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join("meta.json")
    }

    /// Merge a batch of candidates for any number of symbols and dates.
    ///
    /// Invalid candidates are dropped and counted. Any storage fault aborts
    /// the whole batch: either every touched partition is committed or none
    /// is. Replaying a committed batch is a no-op.
    pub fn upsert(&self, batch: Vec<DailyRecord>) -> Result<MergeReport, MergeFailure> {
        let mut report = MergeReport {
            received: batch.len(),
            ..MergeReport::default()
        };

        let candidates = batch.into_iter().map(|r| Ranked::new(r, 0)).collect();
        let canonical = Canonicalizer::canonicalize(candidates, DuplicatePolicy::HighestTurnover);
        report.invalid = canonical.rejected;
        report.duplicates = canonical.duplicates_dropped;
        if !report.invalid.is_empty() {
            tracing::warn!(
                dropped = report.invalid.total(),
                reasons = ?report.invalid.by_reason,
                "dropped invalid records from merge batch"
            );
        }

        let mut by_partition: BTreeMap<(String, i32), Vec<DailyRecord>> = BTreeMap::new();
        for record in canonical.records {
            by_partition
                .entry((record.symbol.clone(), record.date.year()))
                .or_default()
                .push(record);
        }
        if by_partition.is_empty() {
            return Ok(report);
        }

        let _guard = self
            .commit_lock
            .lock()
            .map_err(|_| MergeFailure::LockPoisoned)?;

        let symbols: BTreeSet<String> = by_partition.keys().map(|(s, _)| s.clone()).collect();
        for symbol in &symbols {
            self.recover_symbol(symbol)
                .map_err(|source| MergeFailure::Recover {
                    symbol: symbol.clone(),
                    source,
                })?;
        }

        let mut staged = Vec::new();
        let mut touched = BTreeSet::new();
        for ((symbol, year), incoming) in by_partition {
            let outcome = self.stage_partition(&symbol, year, incoming, &mut report);
            match outcome {
                Ok(Some(partition)) => {
                    staged.push(partition);
                    touched.insert(symbol);
                }
                Ok(None) => {}
                Err(e) => {
                    discard_staged(&staged);
                    return Err(e);
                }
            }
        }

        if staged.is_empty() {
            tracing::debug!(unchanged = report.unchanged, "merge batch already stored");
            return Ok(report);
        }

        commit(&staged).map_err(MergeFailure::Commit)?;

        for symbol in &touched {
            if let Err(e) = self.write_meta(symbol) {
                tracing::warn!(symbol = %symbol, error = %e, "failed to refresh store metadata");
            }
        }
        report.symbols = touched.into_iter().collect();

        tracing::info!(
            partitions = staged.len(),
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            "committed merge batch"
        );
        Ok(report)
    }

    /// Merge `incoming` into one stored (symbol, year) partition and stage the
    /// result. Returns `None` when nothing would change.
    fn stage_partition(
        &self,
        symbol: &str,
        year: i32,
        incoming: Vec<DailyRecord>,
        report: &mut MergeReport,
    ) -> Result<Option<StagedPartition>, MergeFailure> {
        let path = self.year_path(symbol, year);
        let existing = if path.exists() {
            read_records(&path).map_err(|source| MergeFailure::Read {
                symbol: symbol.to_string(),
                year,
                source,
            })?
        } else {
            Vec::new()
        };

        let mut merged: BTreeMap<NaiveDate, DailyRecord> =
            existing.into_iter().map(|r| (r.date, r)).collect();
        let mut changed = false;
        for record in incoming {
            match merged.get(&record.date) {
                None => report.inserted += 1,
                Some(current) if *current == record => {
                    report.unchanged += 1;
                    continue;
                }
                Some(_) => report.updated += 1,
            }
            changed = true;
            merged.insert(record.date, record);
        }
        if !changed {
            return Ok(None);
        }

        let staging_err = |source: DataError| MergeFailure::Staging {
            symbol: symbol.to_string(),
            year,
            source,
        };
        let dir = self.symbol_dir(symbol);
        fs::create_dir_all(&dir)
            .map_err(|e| staging_err(DataError::Io(format!("create {}: {e}", dir.display()))))?;

        let tmp_path = path.with_extension("parquet.tmp");
        let records: Vec<DailyRecord> = merged.into_values().collect();
        if let Err(e) = write_records(&records, &tmp_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(staging_err(e));
        }
        tracing::debug!(symbol, year, rows = records.len(), "staged store partition");
        Ok(Some(StagedPartition { tmp_path, path }))
    }

    /// Put back partitions left behind by an interrupted commit.
    ///
    /// A `.bak` whose partition is missing is restored; a `.bak` whose
    /// replacement already landed is dropped, as are stale `.tmp` files.
    /// Caller holds the commit lock.
    fn recover_symbol(&self, symbol: &str) -> Result<(), DataError> {
        let sym_dir = self.symbol_dir(symbol);
        if !sym_dir.exists() {
            return Ok(());
        }
        let entries = fs::read_dir(&sym_dir)
            .map_err(|e| DataError::Io(format!("read dir {}: {e}", sym_dir.display())))?;

        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(stem) = name.strip_suffix(".parquet.bak") {
                let target = sym_dir.join(format!("{stem}.parquet"));
                if target.exists() {
                    fs::remove_file(&path)
                        .map_err(|e| DataError::Io(format!("remove {}: {e}", path.display())))?;
                } else {
                    fs::rename(&path, &target)
                        .map_err(|e| DataError::Io(format!("restore {}: {e}", target.display())))?;
                    tracing::warn!(
                        symbol,
                        path = %target.display(),
                        "restored partition from interrupted commit"
                    );
                }
            } else if name.ends_with(".parquet.tmp") {
                fs::remove_file(&path)
                    .map_err(|e| DataError::Io(format!("remove {}: {e}", path.display())))?;
                tracing::debug!(symbol, path = %path.display(), "removed stale staging file");
            }
        }
        Ok(())
    }

    /// Load the stored series for a symbol. Unknown symbols load empty.
    ///
    /// Partitions left as `.bak` by an interrupted commit are restored first.
    pub fn load(&self, symbol: &str) -> Result<Series, DataError> {
        {
            // A poisoned lock still orders recovery against writers.
            let _guard = self
                .commit_lock
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            self.recover_symbol(symbol)?;
        }
        self.read_series(symbol)
    }

    /// Read the committed partitions of a symbol without taking the lock.
    fn read_series(&self, symbol: &str) -> Result<Series, DataError> {
        let sym_dir = self.symbol_dir(symbol);
        if !sym_dir.exists() {
            return Ok(Series::empty(symbol));
        }

        let entries = fs::read_dir(&sym_dir)
            .map_err(|e| DataError::Io(format!("read dir {}: {e}", sym_dir.display())))?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::Io(format!("dir entry: {e}")))?;
            let path = entry.path();

            // Skip meta.json and leftover .tmp/.bak files
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }
            candidates.extend(read_records(&path)?.into_iter().map(|r| Ranked::new(r, 0)));
        }

        let (series, canonical) =
            Canonicalizer::into_series(symbol, candidates, DuplicatePolicy::HighestTurnover);
        if canonical.duplicates_dropped > 0 || !canonical.rejected.is_empty() {
            tracing::warn!(
                symbol,
                duplicates = canonical.duplicates_dropped,
                rejected = canonical.rejected.total(),
                "stored partitions held non-canonical rows"
            );
        }
        Ok(series)
    }

    /// Symbols with a directory in the store, sorted.
    pub fn symbols(&self) -> Result<Vec<String>, DataError> {
        if !self.store_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.store_dir)
            .map_err(|e| DataError::Io(format!("read dir {}: {e}", self.store_dir.display())))?;

        let mut symbols: Vec<String> = entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|name| name.strip_prefix("symbol="))
                    .map(str::to_string)
            })
            .collect();
        symbols.sort();
        Ok(symbols)
    }

    /// Read the metadata sidecar for a symbol, if present and parseable.
    pub fn get_meta(&self, symbol: &str) -> Option<StoreMeta> {
        let content = fs::read_to_string(self.meta_path(symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Which symbols are stored, and their date ranges.
    pub fn status(&self, symbols: &[&str]) -> Vec<StoreStatus> {
        symbols
            .iter()
            .map(|sym| {
                let meta = self.get_meta(sym);
                StoreStatus {
                    symbol: sym.to_string(),
                    stored: meta.is_some(),
                    start_date: meta.as_ref().map(|m| m.start_date),
                    end_date: meta.as_ref().map(|m| m.end_date),
                    record_count: meta.as_ref().map(|m| m.record_count),
                }
            })
            .collect()
    }

    /// Rebuild the sidecar from the committed partitions.
    fn write_meta(&self, symbol: &str) -> Result<(), DataError> {
        let series = self.read_series(symbol)?;
        let (Some(start_date), Some(end_date)) = (series.first_date(), series.last_date()) else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(series.records())
            .map_err(|e| DataError::Meta(format!("hash serialization: {e}")))?;
        let meta = StoreMeta {
            symbol: symbol.to_string(),
            start_date,
            end_date,
            record_count: series.len(),
            data_hash: blake3::hash(&bytes).to_hex().to_string(),
            updated_at: chrono::Local::now().naive_local(),
        };
        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::Meta(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(symbol), json)
            .map_err(|e| DataError::Meta(format!("meta write: {e}")))
    }
}

fn backup_path(path: &Path) -> PathBuf {
    path.with_extension("parquet.bak")
}

fn discard_staged(staged: &[StagedPartition]) {
    for partition in staged {
        let _ = fs::remove_file(&partition.tmp_path);
    }
}

/// Move every staged partition into place, or none of them.
fn commit(staged: &[StagedPartition]) -> Result<(), DataError> {
    // (partition, had a previous file)
    let mut done: Vec<(&StagedPartition, bool)> = Vec::with_capacity(staged.len());

    for partition in staged {
        let had_previous = partition.path.exists();
        let step = (|| -> std::io::Result<()> {
            if had_previous {
                fs::rename(&partition.path, backup_path(&partition.path))?;
            }
            if let Err(e) = fs::rename(&partition.tmp_path, &partition.path) {
                if had_previous {
                    let _ = fs::rename(backup_path(&partition.path), &partition.path);
                }
                return Err(e);
            }
            Ok(())
        })();

        if let Err(e) = step {
            tracing::warn!(path = %partition.path.display(), error = %e, "commit failed, rolling back batch");
            for (committed, had_previous) in done.iter().rev() {
                if *had_previous {
                    let _ = fs::rename(backup_path(&committed.path), &committed.path);
                } else {
                    let _ = fs::remove_file(&committed.path);
                }
            }
            discard_staged(staged);
            return Err(DataError::Io(format!(
                "commit {}: {e}",
                partition.path.display()
            )));
        }
        done.push((partition, had_previous));
    }

    for (partition, had_previous) in done {
        if had_previous {
            let _ = fs::remove_file(backup_path(&partition.path));
        }
    }
    Ok(())
}
