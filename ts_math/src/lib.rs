//! # TS Math
//!
//! Numeric building blocks for the forecasting models in `scenario_forecast`.
//! This crate provides a dense matrix type over `faer`, ordinary least squares with a
//! ridge fallback for rank-deficient designs, log-determinants of covariance
//! matrices, differencing/integration and additive trend/seasonal fitting.

use thiserror::Error;

pub mod differencing;
pub mod linalg;
pub mod trend;

pub use linalg::{least_squares, LeastSquaresFit, Matrix};

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;
