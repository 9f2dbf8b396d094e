//! V20 Filter: green runs whose low-to-high spread reaches the threshold.

use super::runs::Run;
use serde::{Deserialize, Serialize};

/// Detection thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct V20Rules {
    /// Shortest green run that can qualify.
    pub min_run_length: usize,
    /// Minimum `(sell - buy) / buy` in percent.
    pub min_gain_pct: f64,
    /// A pending buy side within this many percent above the buy price is
    /// reported as "About to Arrive".
    pub arrive_threshold_pct: f64,
}

impl Default for V20Rules {
    fn default() -> Self {
        Self {
            min_run_length: 2,
            min_gain_pct: 20.0,
            arrive_threshold_pct: 2.0,
        }
    }
}

impl V20Rules {
    pub fn qualifies(&self, run: &Run) -> bool {
        run.length >= self.min_run_length && run.gain_pct() >= self.min_gain_pct
    }

    /// Keep the qualifying runs, order preserved.
    pub fn filter(&self, runs: Vec<Run>) -> Vec<Run> {
        runs.into_iter().filter(|r| self.qualifies(r)).collect()
    }

    /// Price at or below which a pending buy side counts as arriving.
    pub fn arrive_ceiling(&self, buy_price: f64) -> f64 {
        buy_price * (1.0 + self.arrive_threshold_pct / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::fixtures::day;

    fn run(buy: f64, sell: f64, length: usize) -> Run {
        Run {
            start_date: day(2),
            end_date: day(2),
            start_index: 0,
            end_index: length - 1,
            buy_price: buy,
            sell_price: sell,
            length,
        }
    }

    #[test]
    fn gain_at_threshold_qualifies() {
        let rules = V20Rules::default();
        assert!(rules.qualifies(&run(100.0, 121.0, 3)));
        assert!(rules.qualifies(&run(100.0, 120.0, 2)));
        assert!(!rules.qualifies(&run(100.0, 119.0, 3)));
    }

    #[test]
    fn length_floor_dominates_gain() {
        assert!(!V20Rules::default().qualifies(&run(100.0, 125.0, 1)));
    }

    #[test]
    fn filter_preserves_order() {
        let runs = vec![run(10.0, 20.0, 2), run(10.0, 11.0, 5), run(5.0, 9.0, 4)];
        let kept = V20Rules::default().filter(runs);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].buy_price, 10.0);
        assert_eq!(kept[1].buy_price, 5.0);
    }

    #[test]
    fn partial_rules_fill_defaults() {
        let rules: V20Rules = toml::from_str("min_gain_pct = 25.0").unwrap();
        assert_eq!(rules.min_gain_pct, 25.0);
        assert_eq!(rules.min_run_length, 2);
        assert_eq!(rules.arrive_ceiling(100.0), 102.0);
    }
}
