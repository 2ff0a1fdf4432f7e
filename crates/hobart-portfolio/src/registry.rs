//! Factor Registry
//!
//! Static table of the factors the loader knows how to rank, and the
//! observation table each one is read from.

use crate::settings::PortfolioSettings;
use hobart_data::{DataError, FactorConfig, SourceTable};

/// Factor metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorInfo {
    /// Factor name, matching an observation column
    pub name: &'static str,
    /// Table the factor column lives in
    pub source_table: SourceTable,
    /// Brief description of what the factor measures
    pub description: &'static str,
}

/// Get all available factor info
pub fn available_factors() -> Vec<FactorInfo> {
    vec![
        // Base table
        FactorInfo {
            name: "bar",
            source_table: SourceTable::Base,
            description: "Borrow availability ratio",
        },
        FactorInfo {
            name: "utilization_pct",
            source_table: SourceTable::Base,
            description: "Share of lendable supply on loan",
        },
        FactorInfo {
            name: "loan_rate_avg",
            source_table: SourceTable::Base,
            description: "Average stock loan fee",
        },
        FactorInfo {
            name: "loan_rate_range",
            source_table: SourceTable::Base,
            description: "Spread between highest and lowest loan fee",
        },
        // Metrics table
        FactorInfo {
            name: "bar_delta",
            source_table: SourceTable::Metrics,
            description: "Period change in borrow availability ratio",
        },
        FactorInfo {
            name: "utilization_pct_delta",
            source_table: SourceTable::Metrics,
            description: "Period change in utilization",
        },
        FactorInfo {
            name: "loan_rate_avg_delta",
            source_table: SourceTable::Metrics,
            description: "Period change in average loan fee",
        },
        FactorInfo {
            name: "loan_rate_range_delta",
            source_table: SourceTable::Metrics,
            description: "Period change in loan fee spread",
        },
        FactorInfo {
            name: "short_interest",
            source_table: SourceTable::Metrics,
            description: "Shares sold short",
        },
        FactorInfo {
            name: "short_ratio",
            source_table: SourceTable::Metrics,
            description: "Short interest over average daily volume",
        },
    ]
}

/// Get factor info by name, case-insensitively
pub fn get_factor_info(name: &str) -> Option<FactorInfo> {
    available_factors()
        .into_iter()
        .find(|f| f.name.eq_ignore_ascii_case(name))
}

/// Check that a config names the benchmark or a registered factor of its
/// source table.
pub fn validate_config(config: &FactorConfig, settings: &PortfolioSettings) -> Result<(), DataError> {
    if settings.is_benchmark(&config.factor) {
        return Ok(());
    }
    match get_factor_info(&config.factor) {
        Some(info) if info.source_table == config.source_table => Ok(()),
        _ => Err(DataError::UnknownFactor {
            factor: config.factor.clone(),
            source_table: config.source_table.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hobart_data::{SecurityObservation, Timeframe};
    use rstest::rstest;

    #[test]
    fn test_available_factors() {
        let factors = available_factors();
        assert_eq!(factors.len(), 10);
        let base = factors
            .iter()
            .filter(|f| f.source_table == SourceTable::Base)
            .count();
        assert_eq!(base, 4);
    }

    #[test]
    fn test_registered_factors_are_columns() {
        for info in available_factors() {
            assert!(
                SecurityObservation::fields(info.source_table).contains(&info.name),
                "{} is not a {} column",
                info.name,
                info.source_table
            );
        }
    }

    #[test]
    fn test_get_factor_info() {
        let info = get_factor_info("SHORT_RATIO").unwrap();
        assert_eq!(info.source_table, SourceTable::Metrics);
        assert!(get_factor_info("momentum").is_none());
    }

    #[rstest]
    #[case("bar", SourceTable::Base, true)]
    #[case("bar_delta", SourceTable::Metrics, true)]
    #[case("bar_delta", SourceTable::Base, false)]
    #[case("benchmark", SourceTable::Base, true)]
    #[case("BENCHMARK", SourceTable::Base, true)]
    #[case("momentum", SourceTable::Metrics, false)]
    // plain columns that are not registered factors
    #[case("market_cap", SourceTable::Base, false)]
    #[case("winsorized_5_rtn", SourceTable::Base, false)]
    #[case("age", SourceTable::Base, false)]
    fn test_validate_config(#[case] factor: &str, #[case] table: SourceTable, #[case] ok: bool) {
        let config = FactorConfig::new(factor, Timeframe::Daily, table, None);
        assert_eq!(validate_config(&config, &PortfolioSettings::default()).is_ok(), ok);
    }
}
