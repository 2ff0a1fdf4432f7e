//! Error types for data operations.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur during data operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// A raw row is missing a column required by its observation variant
    #[error("Column {column} missing from {table} row")]
    Schema {
        /// Source table the row came from
        table: String,
        /// Column that was expected
        column: String,
    },

    /// Factor is not registered for its configured source table
    #[error("Unknown factor {factor} for source table {source_table}")]
    UnknownFactor {
        /// Factor identifier
        factor: String,
        /// Source table named by the config
        source_table: String,
    },

    /// Invalid timeframe identifier
    #[error("Invalid timeframe: {0}")]
    InvalidTimeframe(String),

    /// Invalid source table identifier
    #[error("Invalid source table: {0}")]
    InvalidSourceTable(String),

    /// Invalid date range
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// Start date of the range
        start: String,
        /// End date of the range
        end: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    /// Whether retrying the failed operation may succeed.
    ///
    /// Only lock contention and IO failures qualify; constraint, schema and
    /// conversion errors fail the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::SystemIoFailure
            ),
            Self::Io(_) => true,
            _ => false,
        }
    }
}
