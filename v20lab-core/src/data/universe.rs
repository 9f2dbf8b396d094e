//! Symbol universe: named symbol lists loaded from configuration.
//!
//! The universe lives in TOML, either inline in the main config or in its own
//! file, as `[lists]` of symbols (e.g. `nifty50 = ["LT", "SBIN"]`). Nothing is
//! compiled in.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("parse universe TOML: {0}")]
    Parse(String),

    #[error("unknown symbol list '{0}'")]
    UnknownList(String),
}

/// The complete universe configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    #[serde(default)]
    pub lists: BTreeMap<String, Vec<String>>,
}

impl Universe {
    /// Load a universe from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path).map_err(|e| UniverseError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse a universe from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        toml::from_str(content).map_err(|e| UniverseError::Parse(e.to_string()))
    }

    /// Every symbol across all lists, first occurrence order, deduplicated.
    pub fn all_symbols(&self) -> Vec<String> {
        dedup_symbols(self.lists.values().flatten())
    }

    /// Symbols of the named lists, deduplicated.
    pub fn select(&self, names: &[String]) -> Result<Vec<String>, UniverseError> {
        let mut picked = Vec::new();
        for name in names {
            let list = self
                .lists
                .get(name)
                .ok_or_else(|| UniverseError::UnknownList(name.clone()))?;
            picked.extend(list.iter());
        }
        Ok(dedup_symbols(picked))
    }

    /// Get the symbols of one list.
    pub fn list(&self, name: &str) -> Option<&[String]> {
        self.lists.get(name).map(|v| v.as_slice())
    }

    /// Get the list names.
    pub fn list_names(&self) -> Vec<&str> {
        self.lists.keys().map(|s| s.as_str()).collect()
    }

    /// Number of distinct symbols.
    pub fn symbol_count(&self) -> usize {
        self.all_symbols().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.values().all(|l| l.is_empty())
    }
}

/// Trim and uppercase symbols, dropping blanks and repeats.
pub fn dedup_symbols<'a>(symbols: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    symbols
        .into_iter()
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}
