//! Per-security observations.
//!
//! Each observation is one `(gvkey, datadate)` row of either the base or the
//! metrics table. Numeric fields are nullable; a null factor value or market
//! cap excludes the security from ranking rather than failing the run.

use crate::error::{DataError, Result};
use crate::model::SourceTable;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Untyped row as returned by an observation source.
///
/// Column names are lower-case; a column present with a null value is
/// distinct from a column that is absent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRow {
    /// Observation date
    pub datadate: NaiveDate,
    /// Security identifier
    pub gvkey: i64,
    /// Numeric columns by name
    pub values: HashMap<String, Option<f64>>,
}

impl RawRow {
    /// Create an empty row for a security and date.
    pub fn new(datadate: NaiveDate, gvkey: i64) -> Self {
        Self {
            datadate,
            gvkey,
            values: HashMap::new(),
        }
    }

    /// Builder-style column setter.
    pub fn with(mut self, column: &str, value: Option<f64>) -> Self {
        self.values.insert(column.to_ascii_lowercase(), value);
        self
    }

    /// Read a required column.
    fn column(&self, table: SourceTable, column: &str) -> Result<Option<f64>> {
        self.values
            .get(column)
            .copied()
            .ok_or_else(|| DataError::Schema {
                table: table.table_name().to_string(),
                column: column.to_string(),
            })
    }
}

/// Row of the base (level) table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BaseData {
    /// Observation date
    pub datadate: NaiveDate,
    /// Security identifier
    pub gvkey: i64,

    /// Share of lendable supply on loan
    pub utilization_pct: Option<f64>,
    /// Borrow activity rank
    pub bar: Option<f64>,
    /// Average loan age
    pub age: Option<f64>,
    /// Number of open loan tickets
    pub tickets: Option<f64>,
    /// Units on loan
    pub units: Option<f64>,
    /// Market value on loan in USD
    pub market_value_usd: Option<f64>,
    /// Average loan rate
    pub loan_rate_avg: Option<f64>,
    /// Maximum loan rate
    pub loan_rate_max: Option<f64>,
    /// Minimum loan rate
    pub loan_rate_min: Option<f64>,
    /// Loan rate range
    pub loan_rate_range: Option<f64>,
    /// Loan rate standard deviation
    pub loan_rate_stdev: Option<f64>,

    /// Market capitalization
    pub market_cap: Option<f64>,
    /// Shares outstanding
    pub shares_out: Option<f64>,
    /// Traded volume
    pub volume: Option<f64>,
    /// Raw period return
    pub rtn: Option<f64>,
    /// Period return winsorized at 5%
    pub winsorized_5_rtn: Option<f64>,
}

impl BaseData {
    /// Numeric columns of the base table, in storage order.
    pub const FIELDS: &'static [&'static str] = &[
        "utilization_pct",
        "bar",
        "age",
        "tickets",
        "units",
        "market_value_usd",
        "loan_rate_avg",
        "loan_rate_max",
        "loan_rate_min",
        "loan_rate_range",
        "loan_rate_stdev",
        "market_cap",
        "shares_out",
        "volume",
        "rtn",
        "winsorized_5_rtn",
    ];

    /// Translate a raw row, failing if any column is absent.
    pub fn from_row(row: &RawRow) -> Result<Self> {
        let t = SourceTable::Base;
        Ok(Self {
            datadate: row.datadate,
            gvkey: row.gvkey,
            utilization_pct: row.column(t, "utilization_pct")?,
            bar: row.column(t, "bar")?,
            age: row.column(t, "age")?,
            tickets: row.column(t, "tickets")?,
            units: row.column(t, "units")?,
            market_value_usd: row.column(t, "market_value_usd")?,
            loan_rate_avg: row.column(t, "loan_rate_avg")?,
            loan_rate_max: row.column(t, "loan_rate_max")?,
            loan_rate_min: row.column(t, "loan_rate_min")?,
            loan_rate_range: row.column(t, "loan_rate_range")?,
            loan_rate_stdev: row.column(t, "loan_rate_stdev")?,
            market_cap: row.column(t, "market_cap")?,
            shares_out: row.column(t, "shares_out")?,
            volume: row.column(t, "volume")?,
            rtn: row.column(t, "rtn")?,
            winsorized_5_rtn: row.column(t, "winsorized_5_rtn")?,
        })
    }

    /// Value of a named numeric field, `None` if null or unknown.
    pub fn field(&self, name: &str) -> Option<f64> {
        match name {
            "utilization_pct" => self.utilization_pct,
            "bar" => self.bar,
            "age" => self.age,
            "tickets" => self.tickets,
            "units" => self.units,
            "market_value_usd" => self.market_value_usd,
            "loan_rate_avg" => self.loan_rate_avg,
            "loan_rate_max" => self.loan_rate_max,
            "loan_rate_min" => self.loan_rate_min,
            "loan_rate_range" => self.loan_rate_range,
            "loan_rate_stdev" => self.loan_rate_stdev,
            "market_cap" => self.market_cap,
            "shares_out" => self.shares_out,
            "volume" => self.volume,
            "rtn" => self.rtn,
            "winsorized_5_rtn" => self.winsorized_5_rtn,
            _ => None,
        }
    }
}

/// Row of the metrics (delta) table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsData {
    /// Observation date
    pub datadate: NaiveDate,
    /// Security identifier
    pub gvkey: i64,

    /// Change in utilization
    pub utilization_pct_delta: Option<f64>,
    /// Change in borrow activity rank
    pub bar_delta: Option<f64>,
    /// Change in average loan age
    pub age_delta: Option<f64>,
    /// Change in open tickets
    pub tickets_delta: Option<f64>,
    /// Change in units on loan
    pub units_delta: Option<f64>,
    /// Change in market value on loan
    pub market_value_usd_delta: Option<f64>,
    /// Change in average loan rate
    pub loan_rate_avg_delta: Option<f64>,
    /// Change in maximum loan rate
    pub loan_rate_max_delta: Option<f64>,
    /// Change in minimum loan rate
    pub loan_rate_min_delta: Option<f64>,
    /// Change in loan rate range
    pub loan_rate_range_delta: Option<f64>,
    /// Change in loan rate standard deviation
    pub loan_rate_stdev_delta: Option<f64>,

    /// Short interest
    pub short_interest: Option<f64>,
    /// Short interest ratio (days to cover)
    pub short_ratio: Option<f64>,

    /// Market capitalization
    pub market_cap: Option<f64>,
    /// Shares outstanding
    pub shares_out: Option<f64>,
    /// Traded volume
    pub volume: Option<f64>,
    /// Raw period return
    pub rtn: Option<f64>,
    /// Period return winsorized at 5%
    pub winsorized_5_rtn: Option<f64>,
}

impl MetricsData {
    /// Numeric columns of the metrics table, in storage order.
    pub const FIELDS: &'static [&'static str] = &[
        "utilization_pct_delta",
        "bar_delta",
        "age_delta",
        "tickets_delta",
        "units_delta",
        "market_value_usd_delta",
        "loan_rate_avg_delta",
        "loan_rate_max_delta",
        "loan_rate_min_delta",
        "loan_rate_range_delta",
        "loan_rate_stdev_delta",
        "short_interest",
        "short_ratio",
        "market_cap",
        "shares_out",
        "volume",
        "rtn",
        "winsorized_5_rtn",
    ];

    /// Translate a raw row, failing if any column is absent.
    pub fn from_row(row: &RawRow) -> Result<Self> {
        let t = SourceTable::Metrics;
        Ok(Self {
            datadate: row.datadate,
            gvkey: row.gvkey,
            utilization_pct_delta: row.column(t, "utilization_pct_delta")?,
            bar_delta: row.column(t, "bar_delta")?,
            age_delta: row.column(t, "age_delta")?,
            tickets_delta: row.column(t, "tickets_delta")?,
            units_delta: row.column(t, "units_delta")?,
            market_value_usd_delta: row.column(t, "market_value_usd_delta")?,
            loan_rate_avg_delta: row.column(t, "loan_rate_avg_delta")?,
            loan_rate_max_delta: row.column(t, "loan_rate_max_delta")?,
            loan_rate_min_delta: row.column(t, "loan_rate_min_delta")?,
            loan_rate_range_delta: row.column(t, "loan_rate_range_delta")?,
            loan_rate_stdev_delta: row.column(t, "loan_rate_stdev_delta")?,
            short_interest: row.column(t, "short_interest")?,
            short_ratio: row.column(t, "short_ratio")?,
            market_cap: row.column(t, "market_cap")?,
            shares_out: row.column(t, "shares_out")?,
            volume: row.column(t, "volume")?,
            rtn: row.column(t, "rtn")?,
            winsorized_5_rtn: row.column(t, "winsorized_5_rtn")?,
        })
    }

    /// Value of a named numeric field, `None` if null or unknown.
    pub fn field(&self, name: &str) -> Option<f64> {
        match name {
            "utilization_pct_delta" => self.utilization_pct_delta,
            "bar_delta" => self.bar_delta,
            "age_delta" => self.age_delta,
            "tickets_delta" => self.tickets_delta,
            "units_delta" => self.units_delta,
            "market_value_usd_delta" => self.market_value_usd_delta,
            "loan_rate_avg_delta" => self.loan_rate_avg_delta,
            "loan_rate_max_delta" => self.loan_rate_max_delta,
            "loan_rate_min_delta" => self.loan_rate_min_delta,
            "loan_rate_range_delta" => self.loan_rate_range_delta,
            "loan_rate_stdev_delta" => self.loan_rate_stdev_delta,
            "short_interest" => self.short_interest,
            "short_ratio" => self.short_ratio,
            "market_cap" => self.market_cap,
            "shares_out" => self.shares_out,
            "volume" => self.volume,
            "rtn" => self.rtn,
            "winsorized_5_rtn" => self.winsorized_5_rtn,
            _ => None,
        }
    }
}

/// Observation of either table variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SecurityObservation {
    /// Base table row
    Base(BaseData),
    /// Metrics table row
    Metrics(MetricsData),
}

impl SecurityObservation {
    /// Translate a raw row into the variant selected by `table`.
    pub fn from_row(table: SourceTable, row: &RawRow) -> Result<Self> {
        match table {
            SourceTable::Base => BaseData::from_row(row).map(Self::Base),
            SourceTable::Metrics => MetricsData::from_row(row).map(Self::Metrics),
        }
    }

    /// Numeric columns of a table variant.
    pub const fn fields(table: SourceTable) -> &'static [&'static str] {
        match table {
            SourceTable::Base => BaseData::FIELDS,
            SourceTable::Metrics => MetricsData::FIELDS,
        }
    }

    /// Table this observation belongs to.
    pub const fn source_table(&self) -> SourceTable {
        match self {
            Self::Base(_) => SourceTable::Base,
            Self::Metrics(_) => SourceTable::Metrics,
        }
    }

    /// Observation date.
    pub const fn datadate(&self) -> NaiveDate {
        match self {
            Self::Base(b) => b.datadate,
            Self::Metrics(m) => m.datadate,
        }
    }

    /// Security identifier.
    pub const fn gvkey(&self) -> i64 {
        match self {
            Self::Base(b) => b.gvkey,
            Self::Metrics(m) => m.gvkey,
        }
    }

    /// Market capitalization, if known.
    pub const fn market_cap(&self) -> Option<f64> {
        match self {
            Self::Base(b) => b.market_cap,
            Self::Metrics(m) => m.market_cap,
        }
    }

    /// Winsorized realized return, if known.
    pub const fn winsorized_5_rtn(&self) -> Option<f64> {
        match self {
            Self::Base(b) => b.winsorized_5_rtn,
            Self::Metrics(m) => m.winsorized_5_rtn,
        }
    }

    /// Value of a named factor field.
    pub fn factor_value(&self, factor: &str) -> Option<f64> {
        match self {
            Self::Base(b) => b.field(factor),
            Self::Metrics(m) => m.field(factor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 3).unwrap()
    }

    fn full_row(table: SourceTable) -> RawRow {
        SecurityObservation::fields(table)
            .iter()
            .fold(RawRow::new(date(), 1001), |row, column| {
                row.with(column, None)
            })
    }

    #[test]
    fn test_base_translation() {
        let row = full_row(SourceTable::Base)
            .with("bar", Some(3.0))
            .with("market_cap", Some(750.0))
            .with("winsorized_5_rtn", Some(0.02));

        let obs = SecurityObservation::from_row(SourceTable::Base, &row).unwrap();
        assert_eq!(obs.source_table(), SourceTable::Base);
        assert_eq!(obs.gvkey(), 1001);
        assert_eq!(obs.datadate(), date());
        assert_eq!(obs.factor_value("bar"), Some(3.0));
        assert_eq!(obs.factor_value("utilization_pct"), None);
        assert_eq!(obs.market_cap(), Some(750.0));
        assert_eq!(obs.winsorized_5_rtn(), Some(0.02));
    }

    #[test]
    fn test_metrics_translation() {
        let row = full_row(SourceTable::Metrics).with("short_ratio", Some(4.5));
        let obs = SecurityObservation::from_row(SourceTable::Metrics, &row).unwrap();
        assert_eq!(obs.factor_value("short_ratio"), Some(4.5));
        assert_eq!(obs.factor_value("bar"), None);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let row = RawRow::new(date(), 1).with("bar", Some(1.0));
        let err = BaseData::from_row(&row).unwrap_err();
        assert!(matches!(err, DataError::Schema { .. }));
    }

    #[test]
    fn test_field_lists_match_accessors() {
        let row = BaseData::FIELDS
            .iter()
            .fold(RawRow::new(date(), 1), |row, c| row.with(c, Some(1.0)));
        let base = BaseData::from_row(&row).unwrap();
        for field in BaseData::FIELDS {
            assert_eq!(base.field(field), Some(1.0), "{field}");
        }

        let row = MetricsData::FIELDS
            .iter()
            .fold(RawRow::new(date(), 1), |row, c| row.with(c, Some(2.0)));
        let metrics = MetricsData::from_row(&row).unwrap();
        for field in MetricsData::FIELDS {
            assert_eq!(metrics.field(field), Some(2.0), "{field}");
        }
    }
}
