//! V20Lab Core: daily equity records, their persistence, and V20 detection.
//!
//! - Domain types (daily records, canonical per-symbol series)
//! - Feed normalization into validated records
//! - Date-partitioned snapshots and the Series Loader
//! - The Series Store with idempotent insert-or-update merges
//! - Run detection, the V20 filter, and the retest scans
//! - Plain-text reporting of actionable signals

pub mod data;
pub mod domain;
pub mod report;
pub mod signal;

pub use domain::{DailyRecord, InvalidRecord, Series};
pub use signal::{detect, V20Rules, V20Signal};
