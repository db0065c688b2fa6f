//! Error types for the scenario_forecast crate

use sensor_ingest::IngestError;
use thiserror::Error;
use ts_math::MathError;

/// Custom error types for the scenario_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The training window is too short for the requested lag order
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// The seed window is too short or the projection diverged
    #[error("Simulation error: {0}")]
    SimulationError(String),

    /// A single-variable series is degenerate or its forecast failed
    #[error("Forecasting error: {0}")]
    ForecastingError(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error in the configuration file
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error writing JSON or CSV output
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Error from the numeric kernels
    #[error("Math error: {0}")]
    MathError(#[from] MathError),

    /// Error from loading or aligning sensor data
    #[error("Ingest error: {0}")]
    IngestError(#[from] IngestError),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}

impl From<csv::Error> for ForecastError {
    fn from(err: csv::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for ForecastError {
    fn from(err: toml::de::Error) -> Self {
        ForecastError::ConfigError(err.to_string())
    }
}
