//! Average factor returns per portfolio.
//!
//! Persisted rows are loaded into a polars [`DataFrame`] and averaged per
//! `(factor, mkt_cap_class, top)`. Null returns are skipped by the mean, so a
//! portfolio whose legs were empty on some dates is averaged over the dates
//! it actually produced a return.

use crate::export::ExportError;
use hobart_data::FactorReturnRow;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Build a dataframe with one row per persisted factor return.
pub fn returns_frame(rows: &[FactorReturnRow]) -> PolarsResult<DataFrame> {
    let dates: Vec<String> = rows.iter().map(|r| r.datadate.to_string()).collect();
    let factors: Vec<&str> = rows.iter().map(|r| r.factor.as_str()).collect();
    let timeframes: Vec<&str> = rows.iter().map(|r| r.timeframe.as_str()).collect();
    let classes: Vec<&str> = rows.iter().map(|r| r.mkt_cap_class.as_str()).collect();
    let tops: Vec<i64> = rows.iter().map(|r| r.top).collect();
    let long: Vec<Option<f64>> = rows.iter().map(|r| r.long_rtn).collect();
    let short: Vec<Option<f64>> = rows.iter().map(|r| r.short_rtn).collect();
    let rtn: Vec<Option<f64>> = rows.iter().map(|r| r.rtn).collect();
    let consistent: Vec<bool> = rows.iter().map(|r| r.consistent).collect();

    let df = DataFrame::new(vec![
        Series::new("datadate".into(), dates).into(),
        Series::new("factor".into(), factors).into(),
        Series::new("timeframe".into(), timeframes).into(),
        Series::new("mkt_cap_class".into(), classes).into(),
        Series::new("top".into(), tops).into(),
        Series::new("long_rtn".into(), long).into(),
        Series::new("short_rtn".into(), short).into(),
        Series::new("rtn".into(), rtn).into(),
        Series::new("consistent".into(), consistent).into(),
    ])?;

    df.lazy()
        .with_column(col("datadate").cast(DataType::Date))
        .collect()
}

/// Averages of one portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// Factor identifier
    pub factor: String,
    /// Market-cap class
    pub mkt_cap_class: String,
    /// Selection size
    pub top: i64,
    /// Number of dates
    pub periods: i64,
    /// Mean long leg return
    pub mean_long_rtn: Option<f64>,
    /// Mean short leg return
    pub mean_short_rtn: Option<f64>,
    /// Mean combined return
    pub mean_rtn: Option<f64>,
    /// Share of dates flagged consistent
    pub consistent_share: Option<f64>,
}

/// Summary of persisted factor returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnSummary {
    /// One row per `(factor, mkt_cap_class, top)`, sorted
    pub rows: Vec<SummaryRow>,
}

/// Average persisted rows per portfolio.
pub fn summarize(rows: &[FactorReturnRow]) -> Result<ReturnSummary, ExportError> {
    if rows.is_empty() {
        return Ok(ReturnSummary::default());
    }

    let df = returns_frame(rows)?
        .lazy()
        .group_by([col("factor"), col("mkt_cap_class"), col("top")])
        .agg([
            len().cast(DataType::Int64).alias("periods"),
            col("long_rtn").mean().alias("mean_long_rtn"),
            col("short_rtn").mean().alias("mean_short_rtn"),
            col("rtn").mean().alias("mean_rtn"),
            col("consistent")
                .cast(DataType::Float64)
                .mean()
                .alias("consistent_share"),
        ])
        .sort(
            ["factor", "mkt_cap_class", "top"],
            SortMultipleOptions::default(),
        )
        .collect()?;

    let factors = df.column("factor")?.str()?;
    let classes = df.column("mkt_cap_class")?.str()?;
    let tops = df.column("top")?.i64()?;
    let periods = df.column("periods")?.i64()?;
    let long = df.column("mean_long_rtn")?.f64()?;
    let short = df.column("mean_short_rtn")?.f64()?;
    let rtn = df.column("mean_rtn")?.f64()?;
    let consistent = df.column("consistent_share")?.f64()?;

    let rows = (0..df.height())
        .map(|i| SummaryRow {
            factor: factors.get(i).unwrap_or_default().to_string(),
            mkt_cap_class: classes.get(i).unwrap_or_default().to_string(),
            top: tops.get(i).unwrap_or_default(),
            periods: periods.get(i).unwrap_or_default(),
            mean_long_rtn: long.get(i),
            mean_short_rtn: short.get(i),
            mean_rtn: rtn.get(i),
            consistent_share: consistent.get(i),
        })
        .collect();

    Ok(ReturnSummary { rows })
}

fn pct(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3}%", v * 100.0))
}

impl ReturnSummary {
    /// Format as an ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{:<24} {:<6} {:>5} {:>8} {:>10} {:>10} {:>10} {:>8}\n",
            "Factor", "Class", "Top", "Periods", "Long", "Short", "L/S", "Consist."
        ));
        output.push_str(&"-".repeat(88));
        output.push('\n');

        for row in &self.rows {
            output.push_str(&format!(
                "{:<24} {:<6} {:>5} {:>8} {:>10} {:>10} {:>10} {:>8}\n",
                row.factor,
                row.mkt_cap_class,
                row.top,
                row.periods,
                pct(row.mean_long_rtn),
                pct(row.mean_short_rtn),
                pct(row.mean_rtn),
                row.consistent_share
                    .map_or_else(|| "-".to_string(), |s| format!("{:.0}%", s * 100.0)),
            ));
        }

        output
    }
}

impl fmt::Display for ReturnSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ascii_table())
    }
}
