//! V20 signal detection over a canonical daily series.
//!
//! `detect` chains the three stages: green runs, the V20 threshold filter,
//! and the retest scans. Everything here is a pure function of the series
//! snapshot; nothing is persisted.

pub mod retest;
pub mod runs;
pub mod v20;

pub use retest::{retest, BuyStatus, SellStatus, V20Signal};
pub use runs::{green_runs, segment, Run, RunSegment};
pub use v20::V20Rules;

use crate::domain::Series;

/// All V20 signals in `series`, in run order. Empty or short series yield none.
pub fn detect(series: &Series, rules: &V20Rules) -> Vec<V20Signal> {
    let records = series.records();
    rules
        .filter(green_runs(records))
        .iter()
        .map(|run| retest(series.symbol(), records, run, rules))
        .collect()
}
