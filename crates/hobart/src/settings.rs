//! Loader settings.
//!
//! Everything that used to be fixed for a run (years to load, market-cap
//! ranges, selection sizes, retry schedule) lives in one immutable struct
//! handed to the [`Loader`](crate::Loader) at construction.

use crate::error::{LoaderError, Result};
use crate::retry::RetryPolicy;
use hobart_portfolio::PortfolioSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// First year loaded by default.
pub const DEFAULT_FIRST_YEAR: i32 = 2010;
/// Last year loaded by default.
pub const DEFAULT_LAST_YEAR: i32 = 2023;

/// Settings for one loader run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// Calendar years to process, ascending
    pub years: Vec<i32>,
    /// Bucketing, selection and return timing
    pub portfolio: PortfolioSettings,
    /// Retry schedule for store calls
    pub retry: RetryPolicy,
    /// How long a store call waits on a locked database
    pub busy_timeout_ms: u64,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            years: (DEFAULT_FIRST_YEAR..=DEFAULT_LAST_YEAR).collect(),
            portfolio: PortfolioSettings::default(),
            retry: RetryPolicy::default(),
            busy_timeout_ms: 30_000,
        }
    }
}

impl LoaderSettings {
    /// Read settings from a JSON file; absent keys take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| LoaderError::Settings(format!("{}: {e}", path.display())))?;
        let settings: Self = serde_json::from_str(&text)
            .map_err(|e| LoaderError::Settings(format!("{}: {e}", path.display())))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Busy timeout as a duration.
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Check years are present and strictly ascending, then the portfolio settings.
    pub fn validate(&self) -> Result<()> {
        if self.years.is_empty() {
            return Err(LoaderError::Settings("no years to process".to_string()));
        }
        if self.years.windows(2).any(|w| w[0] >= w[1]) {
            return Err(LoaderError::Settings(format!(
                "years must be strictly ascending: {:?}",
                self.years
            )));
        }
        self.portfolio.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hobart_portfolio::ReturnTiming;

    #[test]
    fn test_defaults() {
        let settings = LoaderSettings::default();
        assert_eq!(settings.years.first(), Some(&2010));
        assert_eq!(settings.years.last(), Some(&2023));
        assert_eq!(settings.years.len(), 14);
        assert_eq!(settings.busy_timeout(), Duration::from_secs(30));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_unsorted_years_rejected() {
        let settings = LoaderSettings {
            years: vec![2020, 2019],
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(LoaderError::Settings(_))));

        let settings = LoaderSettings {
            years: Vec::new(),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_invalid_portfolio_settings_rejected() {
        let mut settings = LoaderSettings::default();
        settings.portfolio.selection_sizes = vec![0];
        assert!(matches!(settings.validate(), Err(LoaderError::Settings(_))));
    }

    #[test]
    fn test_from_json_file() {
        let path = std::env::temp_dir().join(format!("hobart_settings_{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"years": [2021, 2022], "portfolio": {"return_timing": "concurrent"}, "retry": {"max_attempts": 5}}"#,
        )
        .unwrap();

        let settings = LoaderSettings::from_json_file(&path).unwrap();
        assert_eq!(settings.years, vec![2021, 2022]);
        assert_eq!(settings.portfolio.return_timing, ReturnTiming::Concurrent);
        assert_eq!(settings.portfolio.selection_sizes, vec![20, 50, 100]);
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.initial_backoff_ms, 500);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_file() {
        assert!(LoaderSettings::from_json_file("/nonexistent/hobart.json").is_err());
    }
}
