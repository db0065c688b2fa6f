//! Error types for the sensor_ingest crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the sensor_ingest crate
#[derive(Debug, Error)]
pub enum IngestError {
    /// One source file could not be parsed; the batch continues without it
    #[error("Parse error in '{file}': {reason}")]
    ParseError { file: String, reason: String },

    /// A location could not be merged; other locations are unaffected
    #[error("Merge error for location '{location}': {reason}")]
    MergeError { location: String, reason: String },

    /// A variable role is bound to a column the series does not have
    #[error("Role error: {0}")]
    RoleError(String),

    /// Error related to data validation
    #[error("Data error: {0}")]
    DataError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, IngestError>;

impl From<PolarsError> for IngestError {
    fn from(err: PolarsError) -> Self {
        IngestError::PolarsError(err.to_string())
    }
}

impl IngestError {
    pub(crate) fn parse(file: &str, reason: impl ToString) -> Self {
        IngestError::ParseError {
            file: file.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn merge(location: &str, reason: impl ToString) -> Self {
        IngestError::MergeError {
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }
}
