#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod loader;
pub mod retry;
pub mod seed;
pub mod settings;

// Re-export main types from sub-crates
pub use hobart_data as data;
pub use hobart_output as output;
pub use hobart_portfolio as portfolio;

pub use error::{LoaderError, Result};
pub use loader::{Loader, RunReport, WindowReport};
pub use retry::RetryPolicy;
pub use seed::{seed_configs, seed_rows};
pub use settings::LoaderSettings;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
