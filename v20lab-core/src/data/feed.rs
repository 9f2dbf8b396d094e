//! Input feed boundary: where raw per-symbol rows come from.
//!
//! The scraper that talks to the exchange is an external collaborator. It
//! leaves one CSV per symbol in a feed directory; [`CsvFeed`] reads those.
//! Other sources implement [`FeedSource`] and plug into the same pipeline.

use super::canonicalize::RejectCounts;
use super::normalize::{RawRow, RowNormalizer, RowOutcome};
use crate::domain::DailyRecord;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("symbol not found in feed: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("feed I/O error: {0}")]
    Io(String),

    #[error("malformed feed file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// Source of raw daily rows for a symbol.
///
/// Implementations handle the specifics of one source; normalization and
/// persistence sit above this trait.
pub trait FeedSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch every raw row the source currently has for `symbol`.
    fn fetch(&self, symbol: &str) -> Result<Vec<RawRow>, FeedError>;
}

/// Reads `{feed_dir}/{SYMBOL}.csv` files written by the scraper.
#[derive(Debug, Clone)]
pub struct CsvFeed {
    feed_dir: PathBuf,
}

impl CsvFeed {
    pub fn new(feed_dir: impl Into<PathBuf>) -> Self {
        Self {
            feed_dir: feed_dir.into(),
        }
    }

    pub fn feed_dir(&self) -> &Path {
        &self.feed_dir
    }

    fn symbol_path(&self, symbol: &str) -> PathBuf {
        self.feed_dir.join(format!("{symbol}.csv"))
    }
}

impl FeedSource for CsvFeed {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, symbol: &str) -> Result<Vec<RawRow>, FeedError> {
        let path = self.symbol_path(symbol);
        if !path.exists() {
            return Err(FeedError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        let malformed = |e: csv::Error| FeedError::Malformed {
            path: path.clone(),
            reason: e.to_string(),
        };
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| FeedError::Io(format!("open {}: {e}", path.display())))?;
        let headers = reader.headers().map_err(malformed)?.clone();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(malformed)?;
            rows.push(RawRow::from_pairs(headers.iter().zip(record.iter())));
        }
        Ok(rows)
    }
}

/// Normalized rows for one symbol, with what was dropped and why.
#[derive(Debug, Clone, Default)]
pub struct FeedBatch {
    pub records: Vec<DailyRecord>,
    pub rejected: RejectCounts,
    pub other_series: usize,
}

impl FeedBatch {
    /// Normalize every raw row fetched for `symbol`.
    pub fn from_rows(symbol: &str, rows: &[RawRow], normalizer: &RowNormalizer) -> Self {
        let mut batch = FeedBatch::default();
        for row in rows {
            match normalizer.normalize(symbol, row) {
                RowOutcome::Record(r) => batch.records.push(r),
                RowOutcome::OtherSeries(_) => batch.other_series += 1,
                RowOutcome::Invalid(e) => {
                    tracing::warn!(symbol, reason = %e, "dropping invalid feed row");
                    batch.rejected.record(&e);
                }
            }
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_feed_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("v20lab_feed_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    const LT_CSV: &str = "\
Symbol,Series,Date,PrevClose,OpenPrice,HighPrice,LowPrice,LastPrice,ClosePrice,AveragePrice,TotalTradedQuantity,TurnoverInRs,No.ofTrades,DeliverableQty,%DlyQttoTradedQty
LT,EQ,02-Jan-2025,\"3,600.00\",\"3,610.00\",\"3,700.00\",\"3,590.00\",\"3,690.00\",\"3,695.00\",\"3,650.10\",\"1,20,000\",\"43,80,12,000.00\",\"25,000\",\"60,000\",50.00
LT,BL,02-Jan-2025,3600,3610,3700,3590,3690,3695,3650,100,365000,1,100,100
LT,EQ,03-Jan-2025,3695,3700,3650,3600,3640,3620,3630,90000,326700000,21000,45000,50.00
";

    #[test]
    fn csv_feed_reads_and_normalizes() {
        let dir = temp_feed_dir();
        fs::write(dir.join("LT.csv"), LT_CSV).unwrap();

        let feed = CsvFeed::new(&dir);
        let rows = feed.fetch("LT").unwrap();
        assert_eq!(rows.len(), 3);

        let batch = FeedBatch::from_rows("LT", &rows, &RowNormalizer::default());
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.other_series, 1);
        // high 3650 below open 3700
        assert_eq!(batch.rejected.by_reason["high_below_body"], 1);
        assert_eq!(batch.records[0].closeprice, 3695.0);
        assert_eq!(batch.records[0].totaltradedquantity, 120_000);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_symbol_file_is_not_found() {
        let dir = temp_feed_dir();
        let feed = CsvFeed::new(&dir);
        assert!(matches!(
            feed.fetch("NOPE"),
            Err(FeedError::SymbolNotFound { symbol }) if symbol == "NOPE"
        ));
        let _ = fs::remove_dir_all(&dir);
    }
}
