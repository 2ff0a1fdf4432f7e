#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bucket;
pub mod history;
pub mod intervals;
pub mod pipeline;
pub mod registry;
pub mod returns;
pub mod selection;
pub mod settings;

pub use bucket::{Buckets, bucketize};
pub use history::{History, HistoryCache, HistoryKey};
pub use intervals::generate_intervals;
pub use pipeline::run_config;
pub use registry::{FactorInfo, available_factors, get_factor_info, validate_config};
pub use returns::{FactorReturnRecord, LegReturn, compute_returns};
pub use selection::{PortfolioLeg, Selection, realized_returns, select};
pub use settings::{
    MarketCapClass, MarketCapRange, PortfolioSettings, ReturnTiming, SettingsError,
};
