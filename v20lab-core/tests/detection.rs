//! End-to-end detection: series in, V20 signals and report text out.

use chrono::NaiveDate;
use v20lab_core::report::{actionable, render_symbol_report};
use v20lab_core::signal::{detect, BuyStatus, SellStatus, V20Rules};
use v20lab_core::{DailyRecord, Series};

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
}

fn bar(date: NaiveDate, open: f64, close: f64, low: f64, high: f64) -> DailyRecord {
    DailyRecord {
        symbol: "LT".into(),
        date,
        prevclose: None,
        openprice: open,
        highprice: high,
        lowprice: low,
        lastprice: Some(close),
        closeprice: close,
        averageprice: None,
        totaltradedquantity: 5_000,
        turnoverinrs: 5_000.0 * close,
        nooftrades: Some(120),
        deliverableqty: None,
        percentdlyqttotradedqty: None,
    }
}

/// Green run of `len` days starting at `start`, lowest low `buy`, highest high `sell`.
fn green_run(start: u32, len: u32, buy: f64, sell: f64) -> Vec<DailyRecord> {
    (0..len)
        .map(|i| {
            let low = if i == 0 { buy } else { buy + 0.5 };
            let high = if i == len - 1 { sell } else { sell - 0.5 };
            bar(d(start + i), low + 0.1, high - 0.1, low, high)
        })
        .collect()
}

// ── Worked scenario ──────────────────────────────────────────────────

#[test]
fn four_day_scenario() {
    let series = Series::from_records(
        "LT",
        vec![
            bar(d(1), 10.0, 12.0, 9.0, 13.0),
            bar(d(2), 12.0, 15.0, 11.0, 16.0),
            bar(d(3), 9.0, 8.0, 7.0, 10.0),
            bar(d(4), 8.0, 7.0, 6.0, 9.0),
        ],
    );
    let signals = detect(&series, &V20Rules::default());
    assert_eq!(signals.len(), 1);

    let s = &signals[0];
    assert_eq!((s.start_date, s.end_date), (d(1), d(2)));
    assert_eq!(s.buy_price, 9.0);
    assert_eq!(s.sell_price, 16.0);
    assert_eq!(s.length, 2);
    assert!((s.gain_pct - 77.777_777).abs() < 1e-3);
    assert_eq!(s.buy_retest_date, Some(d(3)));
    assert_eq!(s.buy_status, BuyStatus::Completed);
    assert_eq!(s.sell_retest_date, None);
    assert_eq!(s.sell_status, SellStatus::Pending);
    assert!(s.is_actionable());

    let text = render_symbol_report(&series, &signals).unwrap();
    assert!(text.starts_with("LT data range: 2025-01-01 -> 2025-01-04\n"));
    assert!(text.contains("Gain: 77.78%"));
    assert!(text.contains("BuyRetest: 2025-01-03 (Completed) | SellRetest: None (Pending)"));
}

// ── V20 threshold ────────────────────────────────────────────────────

#[test]
fn gain_of_twenty_one_percent_qualifies() {
    let series = Series::from_records("LT", green_run(1, 3, 100.0, 121.0));
    let signals = detect(&series, &V20Rules::default());
    assert_eq!(signals.len(), 1);
    assert!((signals[0].gain_pct - 21.0).abs() < 1e-9);
}

#[test]
fn gain_of_nineteen_percent_is_excluded() {
    let series = Series::from_records("LT", green_run(1, 3, 100.0, 119.0));
    assert!(detect(&series, &V20Rules::default()).is_empty());
}

#[test]
fn single_day_run_is_excluded_despite_gain() {
    let series = Series::from_records("LT", vec![bar(d(1), 100.5, 124.5, 100.0, 125.0)]);
    assert!(detect(&series, &V20Rules::default()).is_empty());
}

#[test]
fn custom_rules_change_the_threshold() {
    let series = Series::from_records("LT", green_run(1, 3, 100.0, 119.0));
    let rules = V20Rules {
        min_gain_pct: 15.0,
        ..V20Rules::default()
    };
    assert_eq!(detect(&series, &rules).len(), 1);
}

// ── Multiple runs and windows ────────────────────────────────────────

#[test]
fn signals_follow_run_order_and_window() {
    let mut records = green_run(1, 2, 100.0, 130.0);
    records.push(bar(d(3), 129.0, 125.0, 124.0, 129.5));
    records.extend(green_run(6, 3, 120.0, 150.0));
    records.push(bar(d(9), 149.0, 140.0, 99.0, 149.5));
    let series = Series::from_records("LT", records);

    let signals = detect(&series, &V20Rules::default());
    assert_eq!(signals.len(), 2);
    assert_eq!(signals[0].start_date, d(1));
    assert_eq!(signals[1].start_date, d(6));
    // d9's low of 99 revisits both buy prices
    assert_eq!(signals[0].buy_retest_date, Some(d(9)));
    assert_eq!(signals[1].buy_retest_date, Some(d(9)));

    let recent = detect(&series.since(d(4)), &V20Rules::default());
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].start_date, d(6));
}

#[test]
fn completed_signals_are_not_reported() {
    let mut records = green_run(1, 2, 100.0, 130.0);
    records.push(bar(d(3), 120.0, 99.5, 99.0, 121.0));
    records.push(bar(d(4), 99.5, 131.0, 99.2, 131.5));
    let series = Series::from_records("LT", records);

    let signals = detect(&series, &V20Rules::default());
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].sell_retest_date, Some(d(4)));
    assert_eq!(signals[0].retest_interval_days(), Some(1));
    assert!(actionable(&signals).is_empty());
    assert!(render_symbol_report(&series, &signals).is_none());
}

// ── Empty and short input ────────────────────────────────────────────

#[test]
fn empty_series_yields_nothing() {
    let series = Series::empty("LT");
    let signals = detect(&series, &V20Rules::default());
    assert!(signals.is_empty());
    assert!(render_symbol_report(&series, &signals).is_none());
}

#[test]
fn single_record_series_yields_nothing() {
    let series = Series::from_records("LT", vec![bar(d(1), 10.0, 12.0, 9.0, 13.0)]);
    assert!(detect(&series, &V20Rules::default()).is_empty());
}
