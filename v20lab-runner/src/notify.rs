//! Report delivery boundary.

use std::io::Write;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("delivery via {channel} failed: {reason}")]
    Delivery { channel: String, reason: String },
}

/// Delivers one rendered report per symbol.
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    fn notify(&self, symbol: &str, message: &str) -> Result<(), NotifyError>;
}

/// Prints reports to stdout, separated by a blank line.
#[derive(Debug, Default)]
pub struct StdoutNotifier;

impl Notifier for StdoutNotifier {
    fn name(&self) -> &str {
        "stdout"
    }

    fn notify(&self, _symbol: &str, message: &str) -> Result<(), NotifyError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{message}").map_err(|e| NotifyError::Delivery {
            channel: self.name().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Keeps delivered reports in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    delivered: Mutex<Vec<(String, String)>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivered `(symbol, message)` pairs, in delivery order.
    pub fn delivered(&self) -> Vec<(String, String)> {
        self.delivered
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

impl Notifier for MemoryNotifier {
    fn name(&self) -> &str {
        "memory"
    }

    fn notify(&self, symbol: &str, message: &str) -> Result<(), NotifyError> {
        let mut delivered = self.delivered.lock().map_err(|_| NotifyError::Delivery {
            channel: "memory".to_string(),
            reason: "lock poisoned".to_string(),
        })?;
        delivered.push((symbol.to_string(), message.to_string()));
        Ok(())
    }
}
