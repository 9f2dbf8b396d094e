//! Signal Reporter: plain-text alerts for signals that are still open.
//!
//! Message layout, one message per symbol:
//!
//! ```text
//! LT data range: 2025-01-02 -> 2025-03-28
//! LT V20 Signals:
//! LT | Buy: 2025-01-02 @ 9.00 | Sell: 2025-01-03 @ 16.00 | Gain: 77.78% | Days=2 | BuyRetest: 2025-01-06 (Completed) | SellRetest: None (Pending) | Interval=N/A
//! ```

use crate::domain::Series;
use crate::signal::V20Signal;
use chrono::NaiveDate;
use std::fmt::Write;

/// Signals with at least one side not yet completed, order preserved.
pub fn actionable(signals: &[V20Signal]) -> Vec<&V20Signal> {
    signals.iter().filter(|s| s.is_actionable()).collect()
}

fn date_or_none(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "None".to_string(), |d| d.to_string())
}

/// One summary line for a signal.
pub fn render_line(signal: &V20Signal) -> String {
    let interval = signal
        .retest_interval_days()
        .map_or_else(|| "N/A".to_string(), |d| d.to_string());
    format!(
        "{} | Buy: {} @ {:.2} | Sell: {} @ {:.2} | Gain: {:.2}% | Days={} | BuyRetest: {} ({}) | SellRetest: {} ({}) | Interval={}",
        signal.symbol,
        signal.start_date,
        signal.buy_price,
        signal.end_date,
        signal.sell_price,
        signal.gain_pct,
        signal.length,
        date_or_none(signal.buy_retest_date),
        signal.buy_status,
        date_or_none(signal.sell_retest_date),
        signal.sell_status,
        interval,
    )
}

/// The full message for one symbol, or `None` when nothing is actionable.
pub fn render_symbol_report(series: &Series, signals: &[V20Signal]) -> Option<String> {
    let open = actionable(signals);
    if open.is_empty() {
        return None;
    }

    let symbol = series.symbol();
    let mut out = String::new();
    if let (Some(first), Some(last)) = (series.first_date(), series.last_date()) {
        let _ = writeln!(out, "{symbol} data range: {first} -> {last}");
    }
    let _ = writeln!(out, "{symbol} V20 Signals:");
    for signal in open {
        let _ = writeln!(out, "{}", render_line(signal));
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::fixtures::{day, record};
    use crate::signal::{BuyStatus, SellStatus};

    fn signal(buy: BuyStatus, sell: SellStatus) -> V20Signal {
        V20Signal {
            symbol: "LT".into(),
            start_date: day(2),
            end_date: day(3),
            buy_price: 9.0,
            sell_price: 16.0,
            length: 2,
            gain_pct: (16.0 - 9.0) / 9.0 * 100.0,
            buy_retest_date: (buy == BuyStatus::Completed).then(|| day(6)),
            sell_retest_date: (sell == SellStatus::Completed).then(|| day(9)),
            buy_status: buy,
            sell_status: sell,
        }
    }

    #[test]
    fn line_carries_every_field() {
        let line = render_line(&signal(BuyStatus::Completed, SellStatus::Pending));
        assert_eq!(
            line,
            "LT | Buy: 2025-01-02 @ 9.00 | Sell: 2025-01-03 @ 16.00 | Gain: 77.78% | Days=2 \
             | BuyRetest: 2025-01-06 (Completed) | SellRetest: None (Pending) | Interval=N/A"
        );
    }

    #[test]
    fn completed_interval_is_rendered() {
        let line = render_line(&signal(BuyStatus::Completed, SellStatus::Completed));
        assert!(line.ends_with("Interval=3"));
    }

    #[test]
    fn fully_completed_signals_are_silent() {
        let series = Series::from_canonical("LT", vec![record("LT", day(2), 10.0, 13.0, 9.0, 12.0)]);
        let done = vec![signal(BuyStatus::Completed, SellStatus::Completed)];
        assert!(render_symbol_report(&series, &done).is_none());
        assert!(render_symbol_report(&series, &[]).is_none());
    }

    #[test]
    fn report_has_header_and_one_line_per_open_signal() {
        let series = Series::from_canonical(
            "LT",
            vec![
                record("LT", day(2), 10.0, 13.0, 9.0, 12.0),
                record("LT", day(9), 10.0, 13.0, 9.0, 12.0),
            ],
        );
        let signals = vec![
            signal(BuyStatus::AboutToArrive, SellStatus::Pending),
            signal(BuyStatus::Completed, SellStatus::Completed),
            signal(BuyStatus::Pending, SellStatus::Pending),
        ];
        let text = render_symbol_report(&series, &signals).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "LT data range: 2025-01-02 -> 2025-01-09");
        assert_eq!(lines[1], "LT V20 Signals:");
        assert!(lines[2].contains("BuyRetest: None (About to Arrive)"));
        assert!(lines[3].contains("(Pending)"));
    }
}
