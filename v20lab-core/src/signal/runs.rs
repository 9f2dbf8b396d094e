//! Run Detector: split a date-sorted series into maximal same-colour runs.

use crate::domain::DailyRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A maximal block of consecutive records sharing one green flag.
/// Indices are inclusive positions in the scanned slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSegment {
    pub id: usize,
    pub green: bool,
    pub start_index: usize,
    pub end_index: usize,
}

/// A green run with its entry/exit extremes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_index: usize,
    pub end_index: usize,
    /// Lowest low inside the run.
    pub buy_price: f64,
    /// Highest high inside the run.
    pub sell_price: f64,
    pub length: usize,
}

impl Run {
    /// Worst-entry to best-exit spread, in percent of the buy price.
    pub fn gain_pct(&self) -> f64 {
        (self.sell_price - self.buy_price) / self.buy_price * 100.0
    }
}

/// Partition `records` into runs. The run id increments whenever the green
/// flag flips; the first record opens run 0.
///
/// `records` must be strictly increasing by date.
pub fn segment(records: &[DailyRecord]) -> Vec<RunSegment> {
    debug_assert!(
        records.windows(2).all(|w| w[0].date < w[1].date),
        "run detection requires a date-sorted series"
    );

    let mut segments: Vec<RunSegment> = Vec::new();
    for (i, record) in records.iter().enumerate() {
        let green = record.is_green();
        match segments.last_mut() {
            Some(current) if current.green == green => current.end_index = i,
            _ => segments.push(RunSegment {
                id: segments.len(),
                green,
                start_index: i,
                end_index: i,
            }),
        }
    }
    segments
}

/// Every green run in `records`, in date order, including length-1 runs.
pub fn green_runs(records: &[DailyRecord]) -> Vec<Run> {
    segment(records)
        .into_iter()
        .filter(|s| s.green)
        .map(|s| {
            let days = &records[s.start_index..=s.end_index];
            let buy_price = days.iter().map(|r| r.lowprice).fold(f64::INFINITY, f64::min);
            let sell_price = days
                .iter()
                .map(|r| r.highprice)
                .fold(f64::NEG_INFINITY, f64::max);
            Run {
                start_date: days[0].date,
                end_date: days[days.len() - 1].date,
                start_index: s.start_index,
                end_index: s.end_index,
                buy_price,
                sell_price,
                length: days.len(),
            }
        })
        .collect()
}
