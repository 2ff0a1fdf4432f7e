//! Domain model for factor configs and security observations.

pub mod config;
pub mod observation;

pub use config::{FactorConfig, SourceTable, Timeframe};
pub use observation::{BaseData, MetricsData, RawRow, SecurityObservation};
