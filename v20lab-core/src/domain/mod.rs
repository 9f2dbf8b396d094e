//! Domain types: daily records and per-symbol series.

pub mod record;
pub mod series;

pub use record::{DailyRecord, InvalidRecord};
pub use series::Series;
