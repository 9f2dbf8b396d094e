//! Feed normalization: raw scraped rows → validated [`DailyRecord`]s.
//!
//! Exchange exports arrive with decorated headers (`"Open Price"`,
//! `"No. of Trades"`, `"% Dly Qt to Traded Qty"`), thousands separators in
//! numbers, and several date spellings. Everything is normalized here before
//! a row reaches the Series Store.

use crate::domain::{DailyRecord, InvalidRecord};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Header aliases that survive sanitization with a different spelling.
const COLUMN_ALIASES: &[(&str, &str)] = &[
    ("turnoverrs", "turnoverinrs"),
    ("turnover", "turnoverinrs"),
    ("prevcloseprice", "prevclose"),
    ("totaltradedqty", "totaltradedquantity"),
    ("deliveryqty", "deliverableqty"),
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%b-%Y", "%d-%m-%Y", "%d/%m/%Y"];

/// Normalize a raw column header: lowercase, no whitespace or punctuation,
/// `%` spelled out as `percent`.
pub fn sanitize_column_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().trim_start_matches('\u{feff}').chars() {
        match ch {
            '%' => out.push_str("percent"),
            c if c.is_ascii_alphanumeric() => out.push(c.to_ascii_lowercase()),
            _ => {}
        }
    }
    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == out)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(out)
}

/// Parse a numeric cell, tolerating thousands separators and blank markers.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    match cleaned.as_str() {
        "" | "-" => None,
        s if s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("none") => None,
        s => s.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

/// Parse an integer-valued cell. Fractional exports (`"1200.0"`) are accepted.
pub fn parse_count(raw: &str) -> Option<u64> {
    parse_number(raw)
        .filter(|v| *v >= 0.0 && v.fract() == 0.0)
        .map(|v| v as u64)
}

/// Parse a date cell in any of the formats exchange exports use.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// One feed row: sanitized column name → raw cell text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    cells: BTreeMap<String, String>,
}

impl RawRow {
    /// Build a row from raw headers and cells; headers are sanitized here.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let cells = pairs
            .into_iter()
            .map(|(h, v)| (sanitize_column_name(h), v.to_string()))
            .collect();
        Self { cells }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(|s| s.as_str())
    }

    fn number(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(parse_number)
    }

    fn count(&self, column: &str) -> Option<u64> {
        self.get(column).and_then(parse_count)
    }
}

/// What happened to one feed row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Record(DailyRecord),
    /// Row belongs to another instrument series (e.g. `BE`, `BL`); not an error.
    OtherSeries(String),
    Invalid(InvalidRecord),
}

/// Normalizes rows fetched for one symbol.
#[derive(Debug, Clone)]
pub struct RowNormalizer {
    /// Instrument series to keep when the feed carries a `series` column.
    pub series: Option<String>,
}

impl Default for RowNormalizer {
    fn default() -> Self {
        Self {
            series: Some("EQ".to_string()),
        }
    }
}

impl RowNormalizer {
    pub fn new(series: Option<String>) -> Self {
        Self { series }
    }

    /// Turn one raw row into a record for `symbol`.
    ///
    /// Any symbol-like column in the feed is ignored: the record takes the
    /// symbol the fetch was issued for.
    pub fn normalize(&self, symbol: &str, row: &RawRow) -> RowOutcome {
        if let (Some(wanted), Some(series)) = (&self.series, row.get("series")) {
            let series = series.trim();
            if !series.eq_ignore_ascii_case(wanted) {
                return RowOutcome::OtherSeries(series.to_string());
            }
        }

        match self.build(symbol, row) {
            Ok(record) => match record.validate() {
                Ok(()) => RowOutcome::Record(record),
                Err(e) => RowOutcome::Invalid(e),
            },
            Err(e) => RowOutcome::Invalid(e),
        }
    }

    fn build(&self, symbol: &str, row: &RawRow) -> Result<DailyRecord, InvalidRecord> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(InvalidRecord::EmptySymbol);
        }
        let raw_date = row.get("date").ok_or(InvalidRecord::MissingDate)?;
        let date =
            parse_date(raw_date).ok_or_else(|| InvalidRecord::UnparseableDate(raw_date.to_string()))?;
        let price = |column: &'static str| row.number(column).ok_or(InvalidRecord::MissingField(column));

        Ok(DailyRecord {
            symbol: symbol.to_string(),
            date,
            prevclose: row.number("prevclose"),
            openprice: price("openprice")?,
            highprice: price("highprice")?,
            lowprice: price("lowprice")?,
            lastprice: row.number("lastprice"),
            closeprice: price("closeprice")?,
            averageprice: row.number("averageprice"),
            totaltradedquantity: row.count("totaltradedquantity").unwrap_or(0),
            turnoverinrs: row.number("turnoverinrs").unwrap_or(0.0),
            nooftrades: row.count("nooftrades"),
            deliverableqty: row.count("deliverableqty"),
            percentdlyqttotradedqty: row.number("percentdlyqttotradedqty"),
        })
    }
}
