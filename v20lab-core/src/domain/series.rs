//! Series: one symbol's canonical daily history.

use super::record::DailyRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Ordered daily history for one symbol: strictly increasing dates, no duplicates.
///
/// Construct through [`crate::data::canonicalize::Canonicalizer`] (or the loaders,
/// which use it) so the ordering invariant always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    symbol: String,
    records: Vec<DailyRecord>,
}

impl Series {
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            records: Vec::new(),
        }
    }

    /// Wrap records that are already sorted ascending with unique dates.
    ///
    /// Callers outside this crate go through the canonicalizer; the debug
    /// assertion catches contract violations in tests.
    pub(crate) fn from_canonical(symbol: impl Into<String>, records: Vec<DailyRecord>) -> Self {
        debug_assert!(
            records.windows(2).all(|w| w[0].date < w[1].date),
            "series records must be strictly increasing by date"
        );
        Self {
            symbol: symbol.into(),
            records,
        }
    }

    /// Build a series from arbitrary records: invalid rows, other symbols and
    /// same-date duplicates are dropped (highest turnover survives).
    pub fn from_records(symbol: &str, records: Vec<DailyRecord>) -> Self {
        use crate::data::canonicalize::{Canonicalizer, DuplicatePolicy, Ranked};

        let candidates = records.into_iter().map(|r| Ranked::new(r, 0)).collect();
        Canonicalizer::into_series(symbol, candidates, DuplicatePolicy::HighestTurnover).0
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn records(&self) -> &[DailyRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<DailyRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }

    /// Restrict to records dated on or after `start`.
    pub fn since(&self, start: NaiveDate) -> Series {
        let from = self.records.partition_point(|r| r.date < start);
        Series {
            symbol: self.symbol.clone(),
            records: self.records[from..].to_vec(),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DailyRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a DailyRecord;
    type IntoIter = std::slice::Iter<'a, DailyRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
