//! Portfolio construction settings.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Settings failed validation.
#[derive(Debug, Error)]
#[error("Invalid settings: {0}")]
pub struct SettingsError(pub String);

/// Market-capitalization class of a bucket.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketCapClass {
    /// Small caps
    #[display("SMALL")]
    Small,
    /// Mid caps
    #[display("MID")]
    Mid,
    /// Large caps
    #[display("LARGE")]
    Large,
}

/// Half-open market-cap range `(lower, upper]` for one class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketCapRange {
    /// Class the range defines
    pub class: MarketCapClass,
    /// Exclusive lower bound
    pub lower: f64,
    /// Inclusive upper bound
    pub upper: f64,
}

impl MarketCapRange {
    /// Create a range.
    pub const fn new(class: MarketCapClass, lower: f64, upper: f64) -> Self {
        Self {
            class,
            lower,
            upper,
        }
    }

    /// Whether a market cap falls in this range.
    ///
    /// A cap equal to the upper bound is inside; one equal to the lower bound is not.
    pub fn contains(&self, market_cap: f64) -> bool {
        self.lower < market_cap && market_cap <= self.upper
    }
}

/// When the returns used to score a ranking are realized.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnTiming {
    /// Rank on date i, realize with the returns of date i+1
    #[default]
    #[display("forward")]
    Forward,
    /// Rank and realize on the same date
    #[display("concurrent")]
    Concurrent,
}

/// Immutable settings for bucketing, selection and return timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioSettings {
    /// Market-cap classes, in output order
    pub mkt_cap_ranges: Vec<MarketCapRange>,
    /// Leg sizes per bucket
    pub selection_sizes: Vec<usize>,
    /// Factor whose legs are the whole bucket
    pub benchmark_factor: String,
    /// Return timing convention
    pub return_timing: ReturnTiming,
}

impl Default for PortfolioSettings {
    fn default() -> Self {
        Self {
            mkt_cap_ranges: vec![
                MarketCapRange::new(MarketCapClass::Small, 0.0, 500.0),
                MarketCapRange::new(MarketCapClass::Mid, 500.0, 10_000.0),
                MarketCapRange::new(MarketCapClass::Large, 10_000.0, 999_999_999.0),
            ],
            selection_sizes: vec![20, 50, 100],
            benchmark_factor: "benchmark".to_string(),
            return_timing: ReturnTiming::Forward,
        }
    }
}

impl PortfolioSettings {
    /// Whether `factor` is the benchmark factor.
    pub fn is_benchmark(&self, factor: &str) -> bool {
        factor.eq_ignore_ascii_case(&self.benchmark_factor)
    }

    /// Check that ranges are well formed and disjoint and sizes are positive.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.mkt_cap_ranges.is_empty() {
            return Err(SettingsError("no market-cap ranges".to_string()));
        }
        for (i, range) in self.mkt_cap_ranges.iter().enumerate() {
            if range.lower.partial_cmp(&range.upper) != Some(Ordering::Less) {
                return Err(SettingsError(format!(
                    "{} range ({}, {}] is empty",
                    range.class, range.lower, range.upper
                )));
            }
            for other in &self.mkt_cap_ranges[i + 1..] {
                if other.class == range.class {
                    return Err(SettingsError(format!("{} defined twice", range.class)));
                }
                if range.lower < other.upper && other.lower < range.upper {
                    return Err(SettingsError(format!(
                        "{} and {} ranges overlap",
                        range.class, other.class
                    )));
                }
            }
        }
        if self.selection_sizes.is_empty() || self.selection_sizes.contains(&0) {
            return Err(SettingsError(
                "selection sizes must be non-empty and positive".to_string(),
            ));
        }
        if self.benchmark_factor.trim().is_empty() {
            return Err(SettingsError("benchmark factor name is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(500.0, MarketCapClass::Small)]
    #[case(500.01, MarketCapClass::Mid)]
    #[case(10_000.0, MarketCapClass::Mid)]
    #[case(10_000.5, MarketCapClass::Large)]
    #[case(0.5, MarketCapClass::Small)]
    fn test_cap_on_boundary_uses_inclusive_upper(
        #[case] cap: f64,
        #[case] expected: MarketCapClass,
    ) {
        let settings = PortfolioSettings::default();
        let classes: Vec<_> = settings
            .mkt_cap_ranges
            .iter()
            .filter(|r| r.contains(cap))
            .map(|r| r.class)
            .collect();
        assert_eq!(classes, vec![expected]);
    }

    #[test]
    fn test_zero_cap_is_in_no_bucket() {
        let settings = PortfolioSettings::default();
        assert!(!settings.mkt_cap_ranges.iter().any(|r| r.contains(0.0)));
    }

    #[test]
    fn test_default_settings_are_valid() {
        assert!(PortfolioSettings::default().validate().is_ok());
    }

    #[test]
    fn test_overlapping_ranges_rejected() {
        let settings = PortfolioSettings {
            mkt_cap_ranges: vec![
                MarketCapRange::new(MarketCapClass::Small, 0.0, 600.0),
                MarketCapRange::new(MarketCapClass::Mid, 500.0, 10_000.0),
            ],
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_selection_size_rejected() {
        let settings = PortfolioSettings {
            selection_sizes: vec![20, 0],
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_benchmark_match_is_case_insensitive() {
        let settings = PortfolioSettings::default();
        assert!(settings.is_benchmark("BENCHMARK"));
        assert!(!settings.is_benchmark("bar"));
    }

    #[test]
    fn test_deserialize_partial_settings() {
        let settings: PortfolioSettings =
            serde_json::from_str(r#"{"selection_sizes": [10], "return_timing": "concurrent"}"#)
                .unwrap();
        assert_eq!(settings.selection_sizes, vec![10]);
        assert_eq!(settings.return_timing, ReturnTiming::Concurrent);
        assert_eq!(settings.mkt_cap_ranges.len(), 3);
    }
}
