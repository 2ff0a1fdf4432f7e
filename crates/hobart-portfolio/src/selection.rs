//! Long/short leg selection.
//!
//! Within a ranked bucket the long leg is the bottom N (lowest factor values)
//! and the short leg the top N. A bucket with fewer than 2N eligible members
//! still yields legs, but they may overlap or be short, and the selection is
//! flagged as not consistent.

use crate::bucket::Buckets;
use crate::settings::{MarketCapClass, PortfolioSettings};
use hobart_data::SecurityObservation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Realized return per gvkey on the date a selection is scored.
///
/// A gvkey missing from the map has no observation on that date; a `None`
/// value means it was observed without a return.
pub type RealizedReturns = HashMap<i64, Option<f64>>;

/// Collect realized returns from one date's observations.
pub fn realized_returns(observations: &[SecurityObservation]) -> RealizedReturns {
    observations
        .iter()
        .map(|obs| (obs.gvkey(), obs.winsorized_5_rtn()))
        .collect()
}

/// Securities of one side of a portfolio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioLeg {
    /// Selected gvkeys, in rank order
    pub gvkeys: Vec<i64>,
    /// Non-null realized returns of the selected gvkeys
    pub returns: Vec<f64>,
}

impl PortfolioLeg {
    fn from_members(members: &[&SecurityObservation], realized: &RealizedReturns) -> Self {
        let gvkeys: Vec<i64> = members.iter().map(|m| m.gvkey()).collect();
        let returns = gvkeys
            .iter()
            .filter_map(|g| realized.get(g).copied().flatten())
            .collect();
        Self { gvkeys, returns }
    }

    /// Whether no security was selected.
    pub fn is_empty(&self) -> bool {
        self.gvkeys.is_empty()
    }

    /// Number of selected securities.
    pub fn len(&self) -> usize {
        self.gvkeys.len()
    }
}

/// Long and short legs for one market-cap class and selection size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Market-cap class of the bucket
    pub mkt_cap_class: MarketCapClass,
    /// Selection size; 0 for the whole-bucket benchmark
    pub top: usize,
    /// Bottom-ranked securities, bought
    pub long: PortfolioLeg,
    /// Top-ranked securities, sold short
    pub short: PortfolioLeg,
    /// Whether the bucket held at least twice the selection size
    pub consistent: bool,
}

/// Select legs for every bucket and selection size.
///
/// Only bucket members present in `realized` take part. For the benchmark
/// factor each bucket yields a single selection of size 0 whose legs are the
/// whole bucket.
pub fn select(
    factor: &str,
    buckets: &Buckets<'_>,
    realized: &RealizedReturns,
    settings: &PortfolioSettings,
) -> Vec<Selection> {
    let benchmark = settings.is_benchmark(factor);
    let mut selections = Vec::new();

    for (&mkt_cap_class, members) in buckets {
        let eligible: Vec<&SecurityObservation> = members
            .iter()
            .copied()
            .filter(|m| realized.contains_key(&m.gvkey()))
            .collect();

        if benchmark {
            let leg = PortfolioLeg::from_members(&eligible, realized);
            selections.push(Selection {
                mkt_cap_class,
                top: 0,
                long: leg.clone(),
                short: leg,
                consistent: true,
            });
            continue;
        }

        for &n in &settings.selection_sizes {
            let take = n.min(eligible.len());
            let flop = &eligible[..take];
            let top = &eligible[eligible.len() - take..];

            selections.push(Selection {
                mkt_cap_class,
                top: n,
                long: PortfolioLeg::from_members(flop, realized),
                short: PortfolioLeg::from_members(top, realized),
                consistent: eligible.len() >= n.saturating_mul(2),
            });
        }
    }

    selections
}
