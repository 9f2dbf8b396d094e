//! Persisted record schema and Parquet conversion helpers.
//!
//! Snapshot partitions and the Series Store share one column layout. Files
//! written by other tools are accepted as long as the required columns exist
//! and cast to the expected types; optional columns may be absent.

use super::error::DataError;
use crate::domain::DailyRecord;
use chrono::NaiveDate;
use polars::prelude::*;
use std::fs;
use std::path::Path;

/// Expected schema for persisted daily records
pub struct RecordSchema;

/// Columns that must be present in every persisted file.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "symbol",
    "date",
    "openprice",
    "highprice",
    "lowprice",
    "closeprice",
    "totaltradedquantity",
    "turnoverinrs",
];

impl RecordSchema {
    /// Get the canonical record schema
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new("symbol".into(), DataType::String),
            Field::new("date".into(), DataType::Date),
            Field::new("prevclose".into(), DataType::Float64),
            Field::new("openprice".into(), DataType::Float64),
            Field::new("highprice".into(), DataType::Float64),
            Field::new("lowprice".into(), DataType::Float64),
            Field::new("lastprice".into(), DataType::Float64),
            Field::new("closeprice".into(), DataType::Float64),
            Field::new("averageprice".into(), DataType::Float64),
            Field::new("totaltradedquantity".into(), DataType::UInt64),
            Field::new("turnoverinrs".into(), DataType::Float64),
            Field::new("nooftrades".into(), DataType::UInt64),
            Field::new("deliverableqty".into(), DataType::UInt64),
            Field::new("percentdlyqttotradedqty".into(), DataType::Float64),
        ])
    }

    /// Validate a DataFrame: required columns present and castable.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let expected = Self::schema();
        for name in REQUIRED_COLUMNS {
            let column = df
                .column(name)
                .map_err(|_| SchemaError::MissingColumn(name.to_string()))?;
            let dtype = expected
                .get(name)
                .ok_or_else(|| SchemaError::MissingColumn(name.to_string()))?;
            column
                .cast(dtype)
                .map_err(|_| SchemaError::TypeMismatch {
                    column: name.to_string(),
                    expected: dtype.clone(),
                    actual: column.dtype().clone(),
                })?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}

/// 1970-01-01, the Parquet date epoch.
fn epoch() -> NaiveDate {
    NaiveDate::default()
}

/// Convert records to a Polars DataFrame in the canonical column order.
pub fn records_to_dataframe(records: &[DailyRecord]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = records
        .iter()
        .map(|r| (r.date - epoch()).num_days() as i32)
        .collect();

    DataFrame::new(vec![
        Column::new(
            "symbol".into(),
            records.iter().map(|r| r.symbol.as_str()).collect::<Vec<_>>(),
        ),
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::Parquet(format!("date cast: {e}")))?,
        Column::new("prevclose".into(), collect(records, |r| r.prevclose)),
        Column::new("openprice".into(), collect(records, |r| r.openprice)),
        Column::new("highprice".into(), collect(records, |r| r.highprice)),
        Column::new("lowprice".into(), collect(records, |r| r.lowprice)),
        Column::new("lastprice".into(), collect(records, |r| r.lastprice)),
        Column::new("closeprice".into(), collect(records, |r| r.closeprice)),
        Column::new("averageprice".into(), collect(records, |r| r.averageprice)),
        Column::new(
            "totaltradedquantity".into(),
            collect(records, |r| r.totaltradedquantity),
        ),
        Column::new("turnoverinrs".into(), collect(records, |r| r.turnoverinrs)),
        Column::new("nooftrades".into(), collect(records, |r| r.nooftrades)),
        Column::new("deliverableqty".into(), collect(records, |r| r.deliverableqty)),
        Column::new(
            "percentdlyqttotradedqty".into(),
            collect(records, |r| r.percentdlyqttotradedqty),
        ),
    ])
    .map_err(|e| DataError::Parquet(format!("dataframe creation: {e}")))
}

fn collect<T>(records: &[DailyRecord], f: impl Fn(&DailyRecord) -> T) -> Vec<T> {
    records.iter().map(f).collect()
}

/// Convert a DataFrame back to records. Rows keep their file order.
///
/// A null in any required column is an error; optional columns map to `None`.
pub fn dataframe_to_records(df: &DataFrame) -> Result<Vec<DailyRecord>, DataError> {
    RecordSchema::validate(df)?;

    let schema = RecordSchema::schema();
    let column = |name: &str| -> Result<Option<Column>, DataError> {
        let Ok(col) = df.column(name) else {
            return Ok(None);
        };
        let dtype = schema
            .get(name)
            .ok_or_else(|| DataError::Validation(format!("unknown column '{name}'")))?;
        col.cast(dtype)
            .map(Some)
            .map_err(|e| DataError::Parquet(format!("{name} cast: {e}")))
    };
    let required = |name: &str| -> Result<Column, DataError> {
        column(name)?.ok_or_else(|| DataError::Validation(format!("missing column '{name}'")))
    };
    let type_err = |name: &str, e: PolarsError| DataError::Parquet(format!("{name} column type: {e}"));

    let symbol_col = required("symbol")?;
    let date_col = required("date")?;
    let open_col = required("openprice")?;
    let high_col = required("highprice")?;
    let low_col = required("lowprice")?;
    let close_col = required("closeprice")?;
    let qty_col = required("totaltradedquantity")?;
    let turnover_col = required("turnoverinrs")?;
    let prev_col = column("prevclose")?;
    let last_col = column("lastprice")?;
    let avg_col = column("averageprice")?;
    let trades_col = column("nooftrades")?;
    let deliv_col = column("deliverableqty")?;
    let pct_col = column("percentdlyqttotradedqty")?;

    let symbols = symbol_col.str().map_err(|e| type_err("symbol", e))?;
    let dates = date_col.date().map_err(|e| type_err("date", e))?;
    let opens = open_col.f64().map_err(|e| type_err("openprice", e))?;
    let highs = high_col.f64().map_err(|e| type_err("highprice", e))?;
    let lows = low_col.f64().map_err(|e| type_err("lowprice", e))?;
    let closes = close_col.f64().map_err(|e| type_err("closeprice", e))?;
    let qtys = qty_col.u64().map_err(|e| type_err("totaltradedquantity", e))?;
    let turnovers = turnover_col.f64().map_err(|e| type_err("turnoverinrs", e))?;

    let opt_f64 = |col: &Option<Column>, name: &str| -> Result<Option<Float64Chunked>, DataError> {
        col.as_ref()
            .map(|c| c.f64().cloned().map_err(|e| type_err(name, e)))
            .transpose()
    };
    let opt_u64 = |col: &Option<Column>, name: &str| -> Result<Option<UInt64Chunked>, DataError> {
        col.as_ref()
            .map(|c| c.u64().cloned().map_err(|e| type_err(name, e)))
            .transpose()
    };
    let prevs = opt_f64(&prev_col, "prevclose")?;
    let lasts = opt_f64(&last_col, "lastprice")?;
    let avgs = opt_f64(&avg_col, "averageprice")?;
    let trades = opt_u64(&trades_col, "nooftrades")?;
    let delivs = opt_u64(&deliv_col, "deliverableqty")?;
    let pcts = opt_f64(&pct_col, "percentdlyqttotradedqty")?;

    let null_at = |name: &str, i: usize| DataError::Validation(format!("null {name} at row {i}"));
    let epoch = epoch();
    let n = df.height();
    let mut records = Vec::with_capacity(n);

    for i in 0..n {
        let days = dates.get(i).ok_or_else(|| null_at("date", i))?;
        records.push(DailyRecord {
            symbol: symbols.get(i).ok_or_else(|| null_at("symbol", i))?.to_string(),
            date: epoch + chrono::Duration::days(days as i64),
            prevclose: prevs.as_ref().and_then(|c| c.get(i)),
            openprice: opens.get(i).ok_or_else(|| null_at("openprice", i))?,
            highprice: highs.get(i).ok_or_else(|| null_at("highprice", i))?,
            lowprice: lows.get(i).ok_or_else(|| null_at("lowprice", i))?,
            lastprice: lasts.as_ref().and_then(|c| c.get(i)),
            closeprice: closes.get(i).ok_or_else(|| null_at("closeprice", i))?,
            averageprice: avgs.as_ref().and_then(|c| c.get(i)),
            totaltradedquantity: qtys
                .get(i)
                .ok_or_else(|| null_at("totaltradedquantity", i))?,
            turnoverinrs: turnovers
                .get(i)
                .ok_or_else(|| null_at("turnoverinrs", i))?,
            nooftrades: trades.as_ref().and_then(|c| c.get(i)),
            deliverableqty: delivs.as_ref().and_then(|c| c.get(i)),
            percentdlyqttotradedqty: pcts.as_ref().and_then(|c| c.get(i)),
        });
    }

    Ok(records)
}

/// Write records to a Parquet file (not atomic; callers stage and rename).
pub fn write_records(records: &[DailyRecord], path: &Path) -> Result<(), DataError> {
    let mut df = records_to_dataframe(records)?;
    let file = fs::File::create(path)
        .map_err(|e| DataError::Io(format!("create {}: {e}", path.display())))?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .map_err(|e| DataError::Parquet(format!("write {}: {e}", path.display())))?;
    Ok(())
}

/// Read all records from a Parquet file.
pub fn read_records(path: &Path) -> Result<Vec<DailyRecord>, DataError> {
    let file = fs::File::open(path)
        .map_err(|e| DataError::Io(format!("open {}: {e}", path.display())))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::Parquet(format!("read {}: {e}", path.display())))?;
    dataframe_to_records(&df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::fixtures::{day, record};

    #[test]
    fn test_schema_has_all_record_columns() {
        let schema = RecordSchema::schema();
        for name in REQUIRED_COLUMNS {
            assert!(schema.contains(name), "missing {name}");
        }
        assert!(schema.contains("percentdlyqttotradedqty"));
        assert_eq!(schema.len(), 14);
    }

    #[test]
    fn test_validate_accepts_written_frame() {
        let df = records_to_dataframe(&[record("LT", day(2), 10.0, 13.0, 9.0, 12.0)]).unwrap();
        assert!(RecordSchema::validate(&df).is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_column() {
        let df = DataFrame::new(vec![
            Column::new("symbol".into(), &["LT"]),
            Column::new("openprice".into(), &[10.0]),
        ])
        .unwrap();

        let result = RecordSchema::validate(&df);
        assert!(matches!(result, Err(SchemaError::MissingColumn(_))));
    }

    #[test]
    fn test_frame_conversion_keeps_optional_nulls() {
        let mut r = record("LT", day(2), 10.0, 13.0, 9.0, 12.0);
        r.deliverableqty = Some(420);
        let df = records_to_dataframe(&[r.clone()]).unwrap();
        let back = dataframe_to_records(&df).unwrap();
        assert_eq!(back, vec![r]);
        assert_eq!(back[0].prevclose, None);
    }

    #[test]
    fn test_foreign_frame_without_optional_columns_loads() {
        let date = Column::new("date".into(), &[(day(2) - epoch()).num_days() as i32])
            .cast(&DataType::Date)
            .unwrap();
        let df = DataFrame::new(vec![
            Column::new("symbol".into(), &["LT"]),
            date,
            Column::new("openprice".into(), &[10.0]),
            Column::new("highprice".into(), &[13.0]),
            Column::new("lowprice".into(), &[9.0]),
            Column::new("closeprice".into(), &[12.0]),
            Column::new("totaltradedquantity".into(), &[500i64]),
            Column::new("turnoverinrs".into(), &[6000.0]),
        ])
        .unwrap();

        let records = dataframe_to_records(&df).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].totaltradedquantity, 500);
        assert_eq!(records[0].nooftrades, None);
    }

    #[test]
    fn test_null_turnover_is_an_error() {
        let date = Column::new("date".into(), &[(day(2) - epoch()).num_days() as i32])
            .cast(&DataType::Date)
            .unwrap();
        let df = DataFrame::new(vec![
            Column::new("symbol".into(), &["LT"]),
            date,
            Column::new("openprice".into(), &[10.0]),
            Column::new("highprice".into(), &[13.0]),
            Column::new("lowprice".into(), &[9.0]),
            Column::new("closeprice".into(), &[12.0]),
            Column::new("totaltradedquantity".into(), &[500i64]),
            Column::new("turnoverinrs".into(), &[None::<f64>]),
        ])
        .unwrap();

        let err = dataframe_to_records(&df).unwrap_err();
        assert!(matches!(err, DataError::Validation(ref m) if m.contains("turnoverinrs")));
    }
}
