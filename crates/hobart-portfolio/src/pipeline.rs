//! Per-config scoring over a history.

use crate::bucket::bucketize;
use crate::history::History;
use crate::returns::{FactorReturnRecord, compute_returns};
use crate::selection::{realized_returns, select};
use crate::settings::{PortfolioSettings, ReturnTiming};
use chrono::NaiveDate;
use hobart_data::{FactorConfig, SecurityObservation};

/// Score every date of `history` for one config, in ascending date order.
///
/// With [`ReturnTiming::Forward`] each pair of consecutive dates yields the
/// records of the later date, ranked on the earlier one. With
/// [`ReturnTiming::Concurrent`] each date is ranked and realized on itself;
/// the date carried over from the previous window was already scored there
/// and is skipped.
pub fn run_config(
    history: &History,
    config: &FactorConfig,
    settings: &PortfolioSettings,
) -> Vec<FactorReturnRecord> {
    let dates: Vec<(NaiveDate, &[SecurityObservation])> = history.iter().collect();

    match settings.return_timing {
        ReturnTiming::Forward => dates
            .windows(2)
            .flat_map(|pair| {
                let (_, ranked) = pair[0];
                let (realized_on, realized) = pair[1];
                score(realized_on, ranked, realized, config, settings)
            })
            .collect(),
        ReturnTiming::Concurrent => dates
            .iter()
            .filter(|(date, _)| Some(*date) != history.carried_date())
            .flat_map(|&(date, observations)| {
                score(date, observations, observations, config, settings)
            })
            .collect(),
    }
}

fn score(
    datadate: NaiveDate,
    ranked: &[SecurityObservation],
    realized: &[SecurityObservation],
    config: &FactorConfig,
    settings: &PortfolioSettings,
) -> Vec<FactorReturnRecord> {
    let buckets = bucketize(&config.factor, ranked, settings);
    let selections = select(&config.factor, &buckets, &realized_returns(realized), settings);
    compute_returns(datadate, config, &selections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::returns::LegReturn;
    use hobart_data::{BaseData, SourceTable, Timeframe};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, d).unwrap()
    }

    fn obs(d: NaiveDate, gvkey: i64, bar: f64, rtn: f64) -> SecurityObservation {
        SecurityObservation::Base(BaseData {
            datadate: d,
            gvkey,
            bar: Some(bar),
            market_cap: Some(100.0),
            winsorized_5_rtn: Some(rtn),
            ..Default::default()
        })
    }

    fn config() -> FactorConfig {
        FactorConfig::new("bar", Timeframe::Weekly, SourceTable::Base, None)
    }

    fn settings(timing: ReturnTiming) -> PortfolioSettings {
        PortfolioSettings {
            selection_sizes: vec![1],
            return_timing: timing,
            ..Default::default()
        }
    }

    fn history() -> History {
        History::from_observations(vec![
            obs(date(3), 1, 1.0, 0.10),
            obs(date(3), 2, 2.0, 0.20),
            obs(date(10), 1, 5.0, 0.01),
            obs(date(10), 2, 4.0, 0.02),
            obs(date(17), 1, 1.0, 0.03),
            obs(date(17), 2, 2.0, 0.04),
        ])
    }

    #[test]
    fn test_forward_ranks_on_previous_date() {
        let records = run_config(&history(), &config(), &settings(ReturnTiming::Forward));

        // 2 scored dates x 3 classes x 1 size
        assert_eq!(records.len(), 6);
        assert!(records.iter().all(|r| r.datadate != date(3)));

        let first = &records[0];
        assert_eq!(first.datadate, date(10));
        // ranked on the 3rd: gvkey 1 lowest, realized with the 10th's returns
        assert_eq!(first.long_gvkeys, vec![1]);
        assert_eq!(first.long_rtn, LegReturn::NonZero(0.01));
        assert_eq!(first.short_rtn, LegReturn::NonZero(-0.02));

        let second = records.iter().find(|r| r.datadate == date(17)).unwrap();
        // ranked on the 10th: gvkey 2 lowest
        assert_eq!(second.long_gvkeys, vec![2]);
        assert_eq!(second.long_rtn, LegReturn::NonZero(0.04));
    }

    #[test]
    fn test_concurrent_scores_every_date() {
        let records = run_config(&history(), &config(), &settings(ReturnTiming::Concurrent));
        assert_eq!(records.len(), 9);

        let first = &records[0];
        assert_eq!(first.datadate, date(3));
        assert_eq!(first.long_rtn, LegReturn::NonZero(0.10));
        assert_eq!(first.short_rtn, LegReturn::NonZero(-0.20));
    }

    #[test]
    fn test_single_date_forward_yields_nothing() {
        let history = History::from_observations(vec![obs(date(3), 1, 1.0, 0.1)]);
        let records = run_config(&history, &config(), &settings(ReturnTiming::Forward));
        assert!(records.is_empty());
    }

    #[test]
    fn test_empty_history() {
        let records = run_config(&History::default(), &config(), &settings(ReturnTiming::Forward));
        assert!(records.is_empty());
    }
}
