//! Error types for loader runs.

use hobart_data::DataError;
use thiserror::Error;

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that abort a loader run.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Store or translation failure
    #[error(transparent)]
    Data(#[from] DataError),

    /// A store call kept failing after every retry
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetryExhausted {
        /// Store call that failed
        operation: String,
        /// Attempts made
        attempts: u32,
        /// Last failure
        source: DataError,
    },

    /// Settings failed validation or could not be read
    #[error("Invalid settings: {0}")]
    Settings(String),
}

impl From<hobart_portfolio::SettingsError> for LoaderError {
    fn from(err: hobart_portfolio::SettingsError) -> Self {
        Self::Settings(err.0)
    }
}
