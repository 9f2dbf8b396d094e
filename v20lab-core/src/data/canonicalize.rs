//! Canonicalization: validate, resolve duplicate (symbol, date) keys, sort.
//!
//! Both the Series Store (in-batch duplicates from overlapping fetch windows)
//! and the Series Loader (the same day present in several snapshot
//! partitions) funnel through here, so one rule decides every survivor.

use crate::domain::{DailyRecord, InvalidRecord, Series};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// How to pick the survivor when one (symbol, date) key has several candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Highest `turnoverinrs` wins; equal turnover goes to the more recent
    /// source, then to a field-wise total order.
    #[default]
    HighestTurnover,
    /// Most recent source wins (last write wins); turnover only breaks ties
    /// between candidates of equal recency.
    LatestPartition,
}

/// A candidate record tagged with the recency of the source it came from.
///
/// Recency is only meaningful relative to other candidates in the same call:
/// higher is newer. Store batches use a constant recency.
#[derive(Debug, Clone)]
pub struct Ranked {
    pub record: DailyRecord,
    pub recency: u32,
}

impl Ranked {
    pub fn new(record: DailyRecord, recency: u32) -> Self {
        Self { record, recency }
    }
}

/// Counts of records dropped by validation, keyed by rejection reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectCounts {
    pub by_reason: BTreeMap<String, usize>,
}

impl RejectCounts {
    pub fn record(&mut self, err: &InvalidRecord) {
        *self.by_reason.entry(err.reason().to_string()).or_default() += 1;
    }

    pub fn total(&self) -> usize {
        self.by_reason.values().sum()
    }

    pub fn merge(&mut self, other: &RejectCounts) {
        for (reason, n) in &other.by_reason {
            *self.by_reason.entry(reason.clone()).or_default() += n;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_reason.is_empty()
    }
}

/// Result of canonicalizing a candidate set.
#[derive(Debug, Clone, Default)]
pub struct Canonical {
    /// Survivors sorted by (symbol, date).
    pub records: Vec<DailyRecord>,
    /// Candidates that failed validation.
    pub rejected: RejectCounts,
    /// Valid candidates that lost a duplicate-key contest.
    pub duplicates_dropped: usize,
}

/// Canonicalizer for daily records
pub struct Canonicalizer;

impl Canonicalizer {
    /// Validate, then keep exactly one candidate per (symbol, date) and sort.
    ///
    /// The survivor depends only on field values and recency, never on the
    /// order candidates arrive in.
    pub fn canonicalize(candidates: Vec<Ranked>, policy: DuplicatePolicy) -> Canonical {
        let mut rejected = RejectCounts::default();
        let mut duplicates_dropped = 0;
        let mut winners: BTreeMap<(String, chrono::NaiveDate), Ranked> = BTreeMap::new();

        for candidate in candidates {
            if let Err(e) = candidate.record.validate() {
                tracing::debug!(
                    symbol = %candidate.record.symbol,
                    date = %candidate.record.date,
                    reason = %e,
                    "dropping invalid record"
                );
                rejected.record(&e);
                continue;
            }
            let key = (candidate.record.symbol.clone(), candidate.record.date);
            match winners.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(candidate);
                }
                Entry::Occupied(mut slot) => {
                    duplicates_dropped += 1;
                    if Self::prefer(&candidate, slot.get(), policy) == Ordering::Greater {
                        slot.insert(candidate);
                    }
                }
            }
        }

        Canonical {
            records: winners.into_values().map(|r| r.record).collect(),
            rejected,
            duplicates_dropped,
        }
    }

    /// Canonicalize candidates for a single symbol into a [`Series`].
    ///
    /// Candidates for any other symbol are ignored.
    pub fn into_series(
        symbol: &str,
        candidates: Vec<Ranked>,
        policy: DuplicatePolicy,
    ) -> (Series, Canonical) {
        let own: Vec<Ranked> = candidates
            .into_iter()
            .filter(|c| c.record.symbol == symbol)
            .collect();
        let mut canonical = Self::canonicalize(own, policy);
        let records = std::mem::take(&mut canonical.records);
        (Series::from_canonical(symbol, records), canonical)
    }

    /// `Greater` when `a` should replace `b`.
    fn prefer(a: &Ranked, b: &Ranked, policy: DuplicatePolicy) -> Ordering {
        match policy {
            DuplicatePolicy::HighestTurnover => a
                .record
                .turnoverinrs
                .total_cmp(&b.record.turnoverinrs)
                .then_with(|| a.recency.cmp(&b.recency))
                .then_with(|| a.record.content_cmp(&b.record)),
            DuplicatePolicy::LatestPartition => a
                .recency
                .cmp(&b.recency)
                .then_with(|| a.record.survivor_cmp(&b.record)),
        }
    }
}
