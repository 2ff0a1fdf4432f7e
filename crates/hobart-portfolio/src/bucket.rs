//! Market-cap bucketing and factor ranking.

use crate::settings::{MarketCapClass, PortfolioSettings};
use hobart_data::SecurityObservation;
use std::collections::BTreeMap;

/// Observations of one date per market-cap class.
///
/// For ranked factors each list is sorted ascending by factor value; for the
/// benchmark factor the input order is kept.
pub type Buckets<'a> = BTreeMap<MarketCapClass, Vec<&'a SecurityObservation>>;

/// Partition one date's observations into market-cap buckets.
///
/// Observations with a null market cap, or a cap outside every configured
/// range, land in no bucket. Unless `factor` is the benchmark, observations
/// with a null factor value are dropped and the rest sorted ascending.
pub fn bucketize<'a>(
    factor: &str,
    observations: &'a [SecurityObservation],
    settings: &PortfolioSettings,
) -> Buckets<'a> {
    let benchmark = settings.is_benchmark(factor);

    settings
        .mkt_cap_ranges
        .iter()
        .map(|range| {
            let mut members: Vec<&SecurityObservation> = observations
                .iter()
                .filter(|obs| obs.market_cap().is_some_and(|cap| range.contains(cap)))
                .filter(|obs| benchmark || obs.factor_value(factor).is_some())
                .collect();

            if !benchmark {
                // stable, so ties keep source order
                members.sort_by(|a, b| {
                    let a = a.factor_value(factor).unwrap_or(f64::NAN);
                    let b = b.factor_value(factor).unwrap_or(f64::NAN);
                    a.total_cmp(&b)
                });
            }

            (range.class, members)
        })
        .collect()
}
