//! Structured error types for the data layer.

use thiserror::Error;

/// Errors from reading or writing persisted records.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("schema error: {0}")]
    Schema(#[from] super::schema::SchemaError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("metadata error: {0}")]
    Meta(String),
}

/// A store merge that could not be committed. The batch is rolled back as a
/// whole; no partition touched by it is left half-written.
#[derive(Debug, Error)]
pub enum MergeFailure {
    #[error("reading stored partition {symbol}/{year} failed: {source}")]
    Read {
        symbol: String,
        year: i32,
        #[source]
        source: DataError,
    },

    #[error("staging partition {symbol}/{year} failed: {source}")]
    Staging {
        symbol: String,
        year: i32,
        #[source]
        source: DataError,
    },

    #[error("recovering interrupted commit for {symbol} failed: {source}")]
    Recover {
        symbol: String,
        #[source]
        source: DataError,
    },

    #[error("commit failed, batch rolled back: {0}")]
    Commit(#[source] DataError),

    #[error("store commit lock poisoned by a panicked writer")]
    LockPoisoned,
}
