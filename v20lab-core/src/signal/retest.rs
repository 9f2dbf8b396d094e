//! Retest Engine: forward scans from a qualifying run for the first revisit
//! of its buy price and, after that, of its sell price.

use super::runs::Run;
use super::v20::V20Rules;
use crate::domain::DailyRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuyStatus {
    Completed,
    #[serde(rename = "About to Arrive")]
    AboutToArrive,
    Pending,
}

impl fmt::Display for BuyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuyStatus::Completed => "Completed",
            BuyStatus::AboutToArrive => "About to Arrive",
            BuyStatus::Pending => "Pending",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SellStatus {
    Completed,
    Pending,
}

impl fmt::Display for SellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SellStatus::Completed => "Completed",
            SellStatus::Pending => "Pending",
        })
    }
}

/// A qualifying run plus the state of both retests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct V20Signal {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub buy_price: f64,
    pub sell_price: f64,
    pub length: usize,
    pub gain_pct: f64,
    pub buy_retest_date: Option<NaiveDate>,
    pub sell_retest_date: Option<NaiveDate>,
    pub buy_status: BuyStatus,
    pub sell_status: SellStatus,
}

impl V20Signal {
    /// Days between the buy and sell retests, when both happened.
    pub fn retest_interval_days(&self) -> Option<i64> {
        match (self.buy_retest_date, self.sell_retest_date) {
            (Some(buy), Some(sell)) => Some((sell - buy).num_days()),
            _ => None,
        }
    }

    /// Still worth watching: at least one side has not completed.
    pub fn is_actionable(&self) -> bool {
        !(self.buy_status == BuyStatus::Completed && self.sell_status == SellStatus::Completed)
    }
}

/// Records strictly after `index`, with their positions.
fn after(records: &[DailyRecord], index: usize) -> impl Iterator<Item = (usize, &DailyRecord)> {
    records.iter().enumerate().skip(index + 1)
}

/// Resolve both retests for `run` against the series it was cut from.
///
/// Earliest qualifying date wins on both sides. The buy scan starts the day
/// after the run's first day, so a lower low later inside the run counts.
pub fn retest(symbol: &str, records: &[DailyRecord], run: &Run, rules: &V20Rules) -> V20Signal {
    let buy_hit = after(records, run.start_index).find(|(_, r)| r.lowprice <= run.buy_price);
    let sell_hit = buy_hit.and_then(|(buy_index, _)| {
        after(records, buy_index).find(|(_, r)| r.highprice >= run.sell_price)
    });

    let buy_status = if buy_hit.is_some() {
        BuyStatus::Completed
    } else {
        let ceiling = rules.arrive_ceiling(run.buy_price);
        if after(records, run.start_index).any(|(_, r)| r.lowprice <= ceiling) {
            BuyStatus::AboutToArrive
        } else {
            BuyStatus::Pending
        }
    };
    let sell_status = if sell_hit.is_some() {
        SellStatus::Completed
    } else {
        SellStatus::Pending
    };

    V20Signal {
        symbol: symbol.to_string(),
        start_date: run.start_date,
        end_date: run.end_date,
        buy_price: run.buy_price,
        sell_price: run.sell_price,
        length: run.length,
        gain_pct: run.gain_pct(),
        buy_retest_date: buy_hit.map(|(_, r)| r.date),
        sell_retest_date: sell_hit.map(|(_, r)| r.date),
        buy_status,
        sell_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::fixtures::{day, record};
    use crate::signal::runs::green_runs;

    fn first_run(records: &[DailyRecord]) -> Run {
        green_runs(records).remove(0)
    }

    #[test]
    fn sell_retest_waits_for_buy_retest() {
        // run d2-d3: buy 9, sell 16; d7 high revisits 16 before the buy retest at d8
        let records = vec![
            record("LT", day(2), 10.0, 13.0, 9.0, 12.0),
            record("LT", day(3), 12.0, 16.0, 11.0, 15.0),
            record("LT", day(6), 15.0, 15.5, 12.0, 13.0),
            record("LT", day(7), 13.0, 17.0, 12.5, 12.6),
            record("LT", day(8), 12.0, 12.5, 8.5, 9.0),
            record("LT", day(9), 9.0, 16.2, 8.9, 9.5),
        ];
        let signal = retest("LT", &records, &first_run(&records), &V20Rules::default());
        assert_eq!(signal.buy_retest_date, Some(day(8)));
        assert_eq!(signal.sell_retest_date, Some(day(9)));
        assert_eq!(signal.buy_status, BuyStatus::Completed);
        assert_eq!(signal.sell_status, SellStatus::Completed);
        assert_eq!(signal.retest_interval_days(), Some(1));
        assert!(!signal.is_actionable());
    }

    #[test]
    fn low_within_threshold_is_about_to_arrive() {
        let records = vec![
            record("LT", day(2), 10.0, 13.0, 9.0, 12.0),
            record("LT", day(3), 12.0, 16.0, 11.0, 15.0),
            record("LT", day(6), 10.0, 10.5, 9.1, 9.5),
        ];
        let signal = retest("LT", &records, &first_run(&records), &V20Rules::default());
        assert_eq!(signal.buy_retest_date, None);
        assert_eq!(signal.buy_status, BuyStatus::AboutToArrive);
        assert_eq!(signal.sell_status, SellStatus::Pending);
        assert_eq!(signal.retest_interval_days(), None);
        assert!(signal.is_actionable());
    }

    #[test]
    fn no_approach_is_pending() {
        let records = vec![
            record("LT", day(2), 10.0, 13.0, 9.0, 12.0),
            record("LT", day(3), 12.0, 16.0, 11.0, 15.0),
            record("LT", day(6), 15.0, 15.5, 12.0, 13.0),
        ];
        let signal = retest("LT", &records, &first_run(&records), &V20Rules::default());
        assert_eq!(signal.buy_status, BuyStatus::Pending);
        assert_eq!(signal.sell_retest_date, None);
    }

    #[test]
    fn touching_buy_and_sell_prices_exactly_completes_both() {
        // run d2-d3: buy 9, sell 16
        let records = vec![
            record("LT", day(2), 10.0, 13.0, 9.0, 12.0),
            record("LT", day(3), 12.0, 16.0, 11.0, 15.0),
            record("LT", day(6), 10.0, 10.5, 9.0, 9.5),
            record("LT", day(7), 12.0, 16.0, 11.5, 12.5),
        ];
        let run = first_run(&records);
        assert_eq!((run.buy_price, run.sell_price), (9.0, 16.0));

        let signal = retest("LT", &records, &run, &V20Rules::default());
        assert_eq!(signal.buy_retest_date, Some(day(6)));
        assert_eq!(signal.sell_retest_date, Some(day(7)));
        assert_eq!(signal.buy_status, BuyStatus::Completed);
        assert_eq!(signal.sell_status, SellStatus::Completed);
    }

    #[test]
    fn low_exactly_at_arrive_ceiling_is_about_to_arrive() {
        let rules = V20Rules::default();
        let mut records = vec![
            record("LT", day(2), 10.0, 13.0, 9.0, 12.0),
            record("LT", day(3), 12.0, 16.0, 11.0, 15.0),
        ];
        let ceiling = rules.arrive_ceiling(first_run(&records).buy_price);
        records.push(record("LT", day(6), 10.0, 10.5, ceiling, 9.5));

        let signal = retest("LT", &records, &first_run(&records), &rules);
        assert_eq!(signal.buy_retest_date, None);
        assert_eq!(signal.buy_status, BuyStatus::AboutToArrive);
    }

    #[test]
    fn low_just_above_arrive_ceiling_is_pending() {
        let rules = V20Rules::default();
        let mut records = vec![
            record("LT", day(2), 10.0, 13.0, 9.0, 12.0),
            record("LT", day(3), 12.0, 16.0, 11.0, 15.0),
        ];
        let ceiling = rules.arrive_ceiling(first_run(&records).buy_price);
        records.push(record("LT", day(6), 10.0, 10.5, ceiling + 0.01, 9.5));

        let signal = retest("LT", &records, &first_run(&records), &rules);
        assert_eq!(signal.buy_status, BuyStatus::Pending);
    }

    #[test]
    fn lower_low_inside_run_is_a_buy_retest() {
        let records = vec![
            record("LT", day(2), 10.0, 13.0, 9.5, 12.0),
            record("LT", day(3), 12.0, 16.0, 9.0, 15.0),
        ];
        let signal = retest("LT", &records, &first_run(&records), &V20Rules::default());
        assert_eq!(signal.buy_retest_date, Some(day(3)));
    }

    #[test]
    fn status_labels() {
        assert_eq!(BuyStatus::AboutToArrive.to_string(), "About to Arrive");
        assert_eq!(SellStatus::Pending.to_string(), "Pending");
        assert_eq!(
            serde_json::to_string(&BuyStatus::AboutToArrive).unwrap(),
            "\"About to Arrive\""
        );
    }
}
