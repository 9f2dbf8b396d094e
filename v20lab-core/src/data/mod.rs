//! Data layer: feed normalization, snapshot partitions, and the Series Store.

pub mod canonicalize;
pub mod error;
pub mod feed;
pub mod normalize;
pub mod partition;
pub mod schema;
pub mod store;
pub mod universe;

pub use canonicalize::{Canonical, Canonicalizer, DuplicatePolicy, Ranked, RejectCounts};
pub use error::{DataError, MergeFailure};
pub use feed::{CsvFeed, FeedBatch, FeedError, FeedSource};
pub use normalize::{RawRow, RowNormalizer, RowOutcome};
pub use partition::{LoadReport, PartitionSet};
pub use schema::{RecordSchema, SchemaError};
pub use store::{MergeReport, SeriesStore, StoreMeta, StoreStatus};
pub use universe::{Universe, UniverseError};
