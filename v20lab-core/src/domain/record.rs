//! DailyRecord: one symbol's price/volume summary for one trading day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Daily price/volume/delivery record for a single symbol on a single day.
///
/// Field names follow the normalized feed columns (lowercase, no punctuation)
/// so a feed row maps onto this struct one column at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub symbol: String,
    pub date: NaiveDate,
    pub prevclose: Option<f64>,
    pub openprice: f64,
    pub highprice: f64,
    pub lowprice: f64,
    pub lastprice: Option<f64>,
    pub closeprice: f64,
    pub averageprice: Option<f64>,
    pub totaltradedquantity: u64,
    pub turnoverinrs: f64,
    pub nooftrades: Option<u64>,
    pub deliverableqty: Option<u64>,
    pub percentdlyqttotradedqty: Option<f64>,
}

/// Why a record was rejected. Record-level faults are counted and skipped,
/// never fatal to the batch they arrived in.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidRecord {
    #[error("empty symbol")]
    EmptySymbol,

    #[error("missing date")]
    MissingDate,

    #[error("unparseable date '{0}'")]
    UnparseableDate(String),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("{field} must be a positive finite price, got {value}")]
    NonPositivePrice { field: &'static str, value: f64 },

    #[error("turnover must be finite and non-negative, got {0}")]
    InvalidTurnover(f64),

    #[error("high {high} below low {low}")]
    HighBelowLow { high: f64, low: f64 },

    #[error("high {high} below open/close body")]
    HighBelowBody { high: f64 },

    #[error("low {low} above open/close body")]
    LowAboveBody { low: f64 },
}

impl InvalidRecord {
    /// Stable label used when counting rejections by reason.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::EmptySymbol => "empty_symbol",
            Self::MissingDate => "missing_date",
            Self::UnparseableDate(_) => "unparseable_date",
            Self::MissingField(_) => "missing_field",
            Self::NonPositivePrice { .. } => "non_positive_price",
            Self::InvalidTurnover(_) => "invalid_turnover",
            Self::HighBelowLow { .. } => "high_below_low",
            Self::HighBelowBody { .. } => "high_below_body",
            Self::LowAboveBody { .. } => "low_above_body",
        }
    }
}

impl DailyRecord {
    /// Green day: the close finished above the open.
    pub fn is_green(&self) -> bool {
        self.closeprice > self.openprice
    }

    /// Check the record invariants: non-empty symbol, positive OHLC,
    /// high/low bracketing the open/close body.
    pub fn validate(&self) -> Result<(), InvalidRecord> {
        if self.symbol.trim().is_empty() {
            return Err(InvalidRecord::EmptySymbol);
        }
        for (field, value) in [
            ("openprice", self.openprice),
            ("highprice", self.highprice),
            ("lowprice", self.lowprice),
            ("closeprice", self.closeprice),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(InvalidRecord::NonPositivePrice { field, value });
            }
        }
        if !self.turnoverinrs.is_finite() || self.turnoverinrs < 0.0 {
            return Err(InvalidRecord::InvalidTurnover(self.turnoverinrs));
        }
        if self.highprice < self.lowprice {
            return Err(InvalidRecord::HighBelowLow {
                high: self.highprice,
                low: self.lowprice,
            });
        }
        if self.highprice < self.openprice.max(self.closeprice) {
            return Err(InvalidRecord::HighBelowBody {
                high: self.highprice,
            });
        }
        if self.lowprice > self.openprice.min(self.closeprice) {
            return Err(InvalidRecord::LowAboveBody { low: self.lowprice });
        }
        Ok(())
    }

    /// Total order used to pick a survivor between two records for the same
    /// (symbol, date): higher turnover wins, remaining fields break exact ties.
    ///
    /// `Greater` means `self` should survive over `other`.
    pub fn survivor_cmp(&self, other: &Self) -> Ordering {
        self.turnoverinrs
            .total_cmp(&other.turnoverinrs)
            .then_with(|| self.content_cmp(other))
    }

    /// Field-by-field total order over every non-key column.
    pub fn content_cmp(&self, other: &Self) -> Ordering {
        fn opt_f64(a: Option<f64>, b: Option<f64>) -> Ordering {
            match (a, b) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (a, b) => a.is_some().cmp(&b.is_some()),
            }
        }

        self.totaltradedquantity
            .cmp(&other.totaltradedquantity)
            .then_with(|| self.closeprice.total_cmp(&other.closeprice))
            .then_with(|| self.highprice.total_cmp(&other.highprice))
            .then_with(|| self.lowprice.total_cmp(&other.lowprice))
            .then_with(|| self.openprice.total_cmp(&other.openprice))
            .then_with(|| opt_f64(self.prevclose, other.prevclose))
            .then_with(|| opt_f64(self.lastprice, other.lastprice))
            .then_with(|| opt_f64(self.averageprice, other.averageprice))
            .then_with(|| self.nooftrades.cmp(&other.nooftrades))
            .then_with(|| self.deliverableqty.cmp(&other.deliverableqty))
            .then_with(|| opt_f64(self.percentdlyqttotradedqty, other.percentdlyqttotradedqty))
    }
}
