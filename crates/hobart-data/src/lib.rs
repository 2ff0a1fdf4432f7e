#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod store;

pub use error::{DataError, Result};
pub use model::{
    BaseData, FactorConfig, MetricsData, RawRow, SecurityObservation, SourceTable, Timeframe,
};
pub use store::{
    ConfigRow, DateRange, FactorReturnRow, ObservationSource, ReturnsTarget, SqliteStore,
    StoreStats,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
