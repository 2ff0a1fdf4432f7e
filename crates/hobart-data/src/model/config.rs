//! Factor loader configuration rows.
//!
//! Identifiers are held lower-case inside the loader and written upper-case
//! to the store, matching the seeded `factor_loader_config` table.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sampling frequency of the observation tables.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    /// One observation per month
    #[display("MONTHLY")]
    Monthly,
    /// One observation per week
    #[display("WEEKLY")]
    Weekly,
    /// One observation per trading day
    #[display("DAILY")]
    Daily,
}

impl Timeframe {
    /// All timeframes, in seeding order.
    pub const ALL: [Self; 3] = [Self::Monthly, Self::Weekly, Self::Daily];

    /// Upper-case identifier stored in the database.
    pub const fn to_db_str(&self) -> &'static str {
        match self {
            Self::Monthly => "MONTHLY",
            Self::Weekly => "WEEKLY",
            Self::Daily => "DAILY",
        }
    }
}

impl FromStr for Timeframe {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "weekly" => Ok(Self::Weekly),
            "daily" => Ok(Self::Daily),
            _ => Err(DataError::InvalidTimeframe(s.to_string())),
        }
    }
}

/// Observation table a factor is read from.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTable {
    /// Level data (`base_data`)
    #[display("BASE")]
    Base,
    /// Period-over-period deltas and short interest (`metrics_data`)
    #[display("METRICS")]
    Metrics,
}

impl SourceTable {
    /// Upper-case identifier stored in the database.
    pub const fn to_db_str(&self) -> &'static str {
        match self {
            Self::Base => "BASE",
            Self::Metrics => "METRICS",
        }
    }

    /// Name of the SQL table holding this variant's observations.
    pub const fn table_name(&self) -> &'static str {
        match self {
            Self::Base => "base_data",
            Self::Metrics => "metrics_data",
        }
    }
}

impl FromStr for SourceTable {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base" => Ok(Self::Base),
            "metrics" => Ok(Self::Metrics),
            _ => Err(DataError::InvalidSourceTable(s.to_string())),
        }
    }
}

/// One `(factor, timeframe)` row of the loader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorConfig {
    /// Factor identifier, lower-case
    pub factor: String,
    /// Timeframe the factor is computed on
    pub timeframe: Timeframe,
    /// Table holding the factor field
    pub source_table: SourceTable,
    /// Latest date fully persisted for this config
    pub last_date_persisted: Option<NaiveDate>,
}

impl FactorConfig {
    /// Create a config, normalizing the factor identifier.
    pub fn new(
        factor: impl AsRef<str>,
        timeframe: Timeframe,
        source_table: SourceTable,
        last_date_persisted: Option<NaiveDate>,
    ) -> Self {
        Self {
            factor: factor.as_ref().trim().to_ascii_lowercase(),
            timeframe,
            source_table,
            last_date_persisted,
        }
    }
}

impl fmt::Display for FactorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.factor.to_ascii_uppercase(), self.timeframe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("weekly", Timeframe::Weekly)]
    #[case("WEEKLY", Timeframe::Weekly)]
    #[case(" Monthly ", Timeframe::Monthly)]
    #[case("daily", Timeframe::Daily)]
    fn test_timeframe_parse(#[case] raw: &str, #[case] expected: Timeframe) {
        assert_eq!(raw.parse::<Timeframe>().unwrap(), expected);
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!("hourly".parse::<Timeframe>().is_err());
        assert!("prices".parse::<SourceTable>().is_err());
    }

    #[test]
    fn test_db_round_trip_is_case_insensitive() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.to_db_str().parse::<Timeframe>().unwrap(), tf);
            assert_eq!(tf.to_string(), tf.to_db_str());
        }
        assert_eq!("METRICS".parse::<SourceTable>().unwrap(), SourceTable::Metrics);
    }

    #[test]
    fn test_config_normalizes_factor() {
        let config = FactorConfig::new("BAR_DELTA", Timeframe::Weekly, SourceTable::Metrics, None);
        assert_eq!(config.factor, "bar_delta");
        assert_eq!(config.to_string(), "(BAR_DELTA, WEEKLY)");
    }
}
