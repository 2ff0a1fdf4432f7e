//! Storage collaborators.
//!
//! The loader reads configs and observations through [`ObservationSource`]
//! and writes watermarks and factor returns through [`ReturnsTarget`]. Rows
//! crossing this boundary are plain storage records ([`ConfigRow`],
//! [`FactorReturnRow`]) so the portfolio code never sees column order.

pub mod sqlite;

pub use sqlite::{SqliteStore, StoreStats};

use crate::error::{DataError, Result};
use crate::model::{FactorConfig, RawRow, SourceTable, Timeframe};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateRange {
    /// First date of the range
    pub start: NaiveDate,
    /// Last date of the range
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(DataError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Source of loader configs and raw observations.
pub trait ObservationSource {
    /// All configured `(factor, timeframe)` rows.
    fn fetch_configs(&self) -> Result<Vec<FactorConfig>>;

    /// Raw observation rows of one table variant within an inclusive range.
    fn get_records(
        &self,
        timeframe: Timeframe,
        source_table: SourceTable,
        range: DateRange,
    ) -> Result<Vec<RawRow>>;
}

/// Destination of watermarks and factor returns.
pub trait ReturnsTarget {
    /// Minimum watermark across the configs of a timeframe.
    fn fetch_last_date_persisted(&self, timeframe: Timeframe) -> Result<Option<NaiveDate>>;

    /// Upsert one config watermark and its return rows in a single transaction.
    fn persist(&mut self, config: &ConfigRow, returns: &[FactorReturnRow]) -> Result<()>;
}

impl<S: ObservationSource + ?Sized> ObservationSource for &S {
    fn fetch_configs(&self) -> Result<Vec<FactorConfig>> {
        (**self).fetch_configs()
    }

    fn get_records(
        &self,
        timeframe: Timeframe,
        source_table: SourceTable,
        range: DateRange,
    ) -> Result<Vec<RawRow>> {
        (**self).get_records(timeframe, source_table, range)
    }
}

/// Storage form of a factor config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRow {
    /// Factor identifier, upper-case
    pub factor: String,
    /// Timeframe identifier, upper-case
    pub timeframe: String,
    /// Watermark
    pub last_date_persisted: Option<NaiveDate>,
    /// Source table identifier, upper-case
    pub source_table: String,
}

impl From<&FactorConfig> for ConfigRow {
    fn from(config: &FactorConfig) -> Self {
        Self {
            factor: config.factor.to_ascii_uppercase(),
            timeframe: config.timeframe.to_db_str().to_string(),
            last_date_persisted: config.last_date_persisted,
            source_table: config.source_table.to_db_str().to_string(),
        }
    }
}

impl TryFrom<ConfigRow> for FactorConfig {
    type Error = DataError;

    fn try_from(row: ConfigRow) -> Result<Self> {
        Ok(Self::new(
            &row.factor,
            row.timeframe.parse()?,
            row.source_table.parse()?,
            row.last_date_persisted,
        ))
    }
}

/// Storage form of a factor return record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorReturnRow {
    /// Date the returns are realized on
    pub datadate: NaiveDate,
    /// Factor identifier, upper-case
    pub factor: String,
    /// Timeframe identifier, upper-case
    pub timeframe: String,
    /// Market-cap class, upper-case
    pub mkt_cap_class: String,
    /// Selection size (0 for whole-bucket benchmark legs)
    pub top: i64,
    /// Long leg mean return
    pub long_rtn: Option<f64>,
    /// Short leg mean return, sign-flipped
    pub short_rtn: Option<f64>,
    /// Combined long/short return
    pub rtn: Option<f64>,
    /// Whether the bucket was deep enough for disjoint legs
    pub consistent: bool,
    /// Selected gvkeys per leg as JSON
    pub gvkeys: Option<String>,
}
