//! Serializable run configuration, loaded from TOML.
//!
//! ```toml
//! workers = 4
//!
//! [data]
//! store_dir = "data/store"
//! partitions_dir = "data/daily"
//! feed_dir = "data/feed"
//!
//! [universe]
//! file = "config/universe.toml"
//! [universe.lists]
//! watch = ["LT", "SBIN"]
//!
//! [rules]
//! min_gain_pct = 20.0
//!
//! [loader]
//! duplicate_policy = "highest_turnover"
//!
//! [ingest]
//! series = "EQ"
//!
//! [scan]
//! since = "2025-01-01"
//! source = "partitions"
//! ```
//!
//! Every section is optional and falls back to its defaults.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use v20lab_core::data::{DuplicatePolicy, RowNormalizer, Universe, UniverseError};
use v20lab_core::V20Rules;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("universe: {0}")]
    Universe(#[from] UniverseError),
}

/// Top-level configuration for ingest and scan runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct V20Config {
    /// Size of the bounded per-symbol worker pool.
    pub workers: usize,
    pub data: DataConfig,
    pub universe: UniverseConfig,
    pub rules: V20Rules,
    pub loader: LoaderConfig,
    pub ingest: IngestConfig,
    pub scan: ScanConfig,
}

impl Default for V20Config {
    fn default() -> Self {
        Self {
            workers: 4,
            data: DataConfig::default(),
            universe: UniverseConfig::default(),
            rules: V20Rules::default(),
            loader: LoaderConfig::default(),
            ingest: IngestConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

/// Storage locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Root of the Series Store.
    pub store_dir: PathBuf,
    /// Root of the dated snapshot partitions.
    pub partitions_dir: PathBuf,
    /// Directory the CSV feed reads `{SYMBOL}.csv` from.
    pub feed_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("data/store"),
            partitions_dir: PathBuf::from("data/daily"),
            feed_dir: PathBuf::from("data/feed"),
        }
    }
}

/// Symbol universe: inline lists, an external universe file, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub file: Option<PathBuf>,
    pub lists: BTreeMap<String, Vec<String>>,
}

impl UniverseConfig {
    /// Resolve into a [`Universe`]. File lists replace inline lists of the
    /// same name.
    pub fn resolve(&self) -> Result<Universe, ConfigError> {
        let mut universe = Universe {
            lists: self.lists.clone(),
        };
        if let Some(path) = &self.file {
            universe.lists.extend(Universe::from_file(path)?.lists);
        }
        Ok(universe)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub duplicate_policy: DuplicatePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Instrument series to keep from feeds carrying a `series` column.
    /// Empty keeps every series.
    pub series: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            series: "EQ".to_string(),
        }
    }
}

impl IngestConfig {
    pub fn normalizer(&self) -> RowNormalizer {
        let series = self.series.trim();
        RowNormalizer::new((!series.is_empty()).then(|| series.to_string()))
    }
}

/// Where the scan reads series from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesSource {
    /// Fold the dated snapshot partitions (Series Loader).
    #[default]
    Partitions,
    /// Read the merged Series Store.
    Store,
}

impl FromStr for SeriesSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "partitions" => Ok(Self::Partitions),
            "store" => Ok(Self::Store),
            other => Err(format!(
                "unknown series source '{other}' (expected 'partitions' or 'store')"
            )),
        }
    }
}

impl fmt::Display for SeriesSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Partitions => "partitions",
            Self::Store => "store",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Only records on or after this date are scanned.
    pub since: Option<NaiveDate>,
    pub source: SeriesSource,
}

impl V20Config {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        let rules = &self.rules;
        if rules.min_run_length == 0 {
            return Err(ConfigError::Invalid(
                "rules.min_run_length must be at least 1".into(),
            ));
        }
        if !rules.min_gain_pct.is_finite() || rules.min_gain_pct < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "rules.min_gain_pct must be a non-negative number, got {}",
                rules.min_gain_pct
            )));
        }
        if !rules.arrive_threshold_pct.is_finite() || rules.arrive_threshold_pct < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "rules.arrive_threshold_pct must be a non-negative number, got {}",
                rules.arrive_threshold_pct
            )));
        }
        Ok(())
    }

    /// Symbols to process: the named lists, or the whole universe when
    /// `lists` is empty.
    pub fn symbols(&self, lists: &[String]) -> Result<Vec<String>, ConfigError> {
        let universe = self.universe.resolve()?;
        if lists.is_empty() {
            Ok(universe.all_symbols())
        } else {
            Ok(universe.select(lists)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = V20Config::from_toml("").unwrap();
        assert_eq!(config, V20Config::default());
        assert_eq!(config.workers, 4);
        assert_eq!(config.rules, V20Rules::default());
        assert_eq!(config.scan.source, SeriesSource::Partitions);
        assert_eq!(config.ingest.normalizer().series.as_deref(), Some("EQ"));
    }

    #[test]
    fn sections_override_defaults() {
        let config = V20Config::from_toml(
            r#"
workers = 2

[data]
store_dir = "/tmp/store"

[universe.lists]
watch = ["lt", "SBIN"]

[rules]
arrive_threshold_pct = 3.5

[loader]
duplicate_policy = "latest_partition"

[ingest]
series = ""

[scan]
since = "2025-01-01"
source = "store"
"#,
        )
        .unwrap();

        assert_eq!(config.workers, 2);
        assert_eq!(config.data.store_dir, PathBuf::from("/tmp/store"));
        assert_eq!(config.data.feed_dir, PathBuf::from("data/feed"));
        assert_eq!(config.rules.arrive_threshold_pct, 3.5);
        assert_eq!(config.rules.min_gain_pct, 20.0);
        assert_eq!(config.loader.duplicate_policy, DuplicatePolicy::LatestPartition);
        assert!(config.ingest.normalizer().series.is_none());
        assert_eq!(config.scan.since, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(config.scan.source, SeriesSource::Store);
        assert_eq!(config.symbols(&[]).unwrap(), vec!["LT", "SBIN"]);
    }

    #[test]
    fn zero_workers_rejected() {
        let err = V20Config::from_toml("workers = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn negative_gain_rejected() {
        let err = V20Config::from_toml("[rules]\nmin_gain_pct = -1.0").unwrap_err();
        assert!(err.to_string().contains("min_gain_pct"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            V20Config::from_toml("workers = ").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn unknown_list_is_an_error() {
        let config = V20Config::from_toml("[universe.lists]\na = [\"LT\"]").unwrap();
        assert!(matches!(
            config.symbols(&["b".into()]),
            Err(ConfigError::Universe(UniverseError::UnknownList(_)))
        ));
    }

    #[test]
    fn shipped_config_parses() {
        let config = V20Config::from_toml(include_str!("../../v20lab.toml")).unwrap();
        assert_eq!(config.rules, V20Rules::default());
        assert_eq!(config.universe.file, Some(PathBuf::from("config/universe.toml")));
        assert_eq!(config.universe.lists["watch"].len(), 4);

        let file = Universe::from_toml(include_str!("../../config/universe.toml")).unwrap();
        assert!(file.list("infra").is_some_and(|l| l.contains(&"LT".to_string())));
    }

    #[test]
    fn series_source_parses() {
        assert_eq!("Store".parse::<SeriesSource>().unwrap(), SeriesSource::Store);
        assert!("cloud".parse::<SeriesSource>().is_err());
        assert_eq!(SeriesSource::Partitions.to_string(), "partitions");
    }
}
