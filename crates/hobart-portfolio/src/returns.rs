//! Equal-weighted leg and long/short returns.
//!
//! The short leg is sold, so its contribution is the mean of the negated
//! realized returns. The combined return is only reported when both legs
//! produced a non-zero mean; a leg averaging exactly zero is kept apart from
//! an absent one through [`LegReturn`] so the rule stays visible.

use crate::selection::{PortfolioLeg, Selection};
use crate::settings::MarketCapClass;
use chrono::NaiveDate;
use hobart_data::{FactorConfig, FactorReturnRow, Timeframe};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Mean return of one leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LegReturn {
    /// The leg had no realized returns
    Absent,
    /// The leg averaged exactly zero
    Zero,
    /// The leg averaged a non-zero return
    NonZero(f64),
}

impl LegReturn {
    /// Classify an optional mean.
    pub fn from_mean(mean: Option<f64>) -> Self {
        match mean {
            None => Self::Absent,
            Some(m) if m == 0.0 => Self::Zero,
            Some(m) => Self::NonZero(m),
        }
    }

    /// The mean, if any.
    pub const fn value(self) -> Option<f64> {
        match self {
            Self::Absent => None,
            Self::Zero => Some(0.0),
            Self::NonZero(m) => Some(m),
        }
    }

    /// Combined long/short return, `None` unless both legs are non-zero.
    pub fn combine(long: Self, short: Self) -> Option<f64> {
        match (long, short) {
            (Self::NonZero(l), Self::NonZero(s)) => Some((l + s) / 2.0),
            _ => None,
        }
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    Some(values.sum::<f64>() / n as f64)
}

/// Factor return of one `(date, factor, timeframe, class, size)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorReturnRecord {
    /// Date the returns are realized on
    pub datadate: NaiveDate,
    /// Factor name, lower-case
    pub factor: String,
    /// Timeframe of the observations
    pub timeframe: Timeframe,
    /// Market-cap class of the bucket
    pub mkt_cap_class: MarketCapClass,
    /// Selection size; 0 for the benchmark
    pub top: usize,
    /// Long leg mean
    pub long_rtn: LegReturn,
    /// Short leg mean of negated returns
    pub short_rtn: LegReturn,
    /// Combined return
    pub rtn: Option<f64>,
    /// Whether the legs are disjoint and full
    pub consistent: bool,
    /// Long leg gvkeys
    pub long_gvkeys: Vec<i64>,
    /// Short leg gvkeys
    pub short_gvkeys: Vec<i64>,
}

impl FactorReturnRecord {
    /// Score one selection.
    pub fn from_selection(datadate: NaiveDate, config: &FactorConfig, selection: &Selection) -> Self {
        let long_rtn = LegReturn::from_mean(long_mean(&selection.long));
        let short_rtn = LegReturn::from_mean(short_mean(&selection.short));

        Self {
            datadate,
            factor: config.factor.clone(),
            timeframe: config.timeframe,
            mkt_cap_class: selection.mkt_cap_class,
            top: selection.top,
            long_rtn,
            short_rtn,
            rtn: LegReturn::combine(long_rtn, short_rtn),
            consistent: selection.consistent,
            long_gvkeys: selection.long.gvkeys.clone(),
            short_gvkeys: selection.short.gvkeys.clone(),
        }
    }
}

fn long_mean(leg: &PortfolioLeg) -> Option<f64> {
    mean(leg.returns.iter().copied())
}

fn short_mean(leg: &PortfolioLeg) -> Option<f64> {
    mean(leg.returns.iter().map(|r| -r))
}

/// Score every selection of one date.
pub fn compute_returns(
    datadate: NaiveDate,
    config: &FactorConfig,
    selections: &[Selection],
) -> Vec<FactorReturnRecord> {
    selections
        .iter()
        .map(|s| FactorReturnRecord::from_selection(datadate, config, s))
        .collect()
}

impl From<&FactorReturnRecord> for FactorReturnRow {
    fn from(record: &FactorReturnRecord) -> Self {
        let gvkeys = json!({
            "LONG": record.long_gvkeys,
            "SHORT": record.short_gvkeys,
        });

        Self {
            datadate: record.datadate,
            factor: record.factor.to_ascii_uppercase(),
            timeframe: record.timeframe.to_db_str().to_string(),
            mkt_cap_class: record.mkt_cap_class.to_string(),
            top: record.top as i64,
            long_rtn: record.long_rtn.value(),
            short_rtn: record.short_rtn.value(),
            rtn: record.rtn,
            consistent: record.consistent,
            gvkeys: Some(gvkeys.to_string()),
        }
    }
}
