//! V20Lab Runner: configuration and the ingest/scan pipelines.
//!
//! This crate builds on `v20lab-core` to provide:
//! - TOML configuration with validation
//! - A bounded per-symbol worker pool
//! - Ingest: feed → day snapshot → Series Store merge
//! - Scan: series → V20 signals → report → notifier
//! - JSON/CSV export of detected signals

pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod notify;
pub mod pool;
pub mod scan;

pub use config::{ConfigError, SeriesSource, V20Config};
pub use error::RunError;
pub use export::{write_signals_csv, write_signals_json, SignalExport};
pub use ingest::{ingest, IngestStage, IngestSummary, SymbolIngest, SymbolOutcome};
pub use notify::{MemoryNotifier, Notifier, NotifyError, StdoutNotifier};
pub use pool::WorkerPool;
pub use scan::{scan, ScanSummary, SymbolScan};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_is_send_sync() {
        assert_send::<V20Config>();
        assert_sync::<V20Config>();
    }

    #[test]
    fn summaries_are_send_sync() {
        assert_send::<IngestSummary>();
        assert_sync::<IngestSummary>();
        assert_send::<ScanSummary>();
        assert_sync::<ScanSummary>();
    }

    #[test]
    fn notifiers_are_send_sync() {
        assert_send::<StdoutNotifier>();
        assert_sync::<StdoutNotifier>();
        assert_send::<MemoryNotifier>();
        assert_sync::<MemoryNotifier>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
    }
}
