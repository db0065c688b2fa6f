//! Single-variable forecasting models
//!
//! These are fallbacks for one sensor column at a time. They share the
//! scenario output contract: a [`ForecastSeries`] labelled at the source
//! cadence, here holding just the forecast column.

use crate::error::{ForecastError, Result};
use crate::forecast::ForecastSeries;
use crate::utils::{future_timestamps, validate_steps};
use sensor_ingest::MultivariateSeries;
use statrs::statistics::Statistics;
use std::fmt::Debug;

/// Shortest history a univariate model will accept
pub const MIN_SERIES_LENGTH: usize = 5;

/// Variance below which a series is treated as constant
const CONSTANT_VARIANCE: f64 = 1e-12;

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Point forecasts for the next `horizon` periods
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on a single series
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on a gap-free history
    fn train(&self, data: &[f64]) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// Reject histories that are too short, non-finite or constant
pub fn check_univariate(data: &[f64]) -> Result<()> {
    if data.len() < MIN_SERIES_LENGTH {
        return Err(ForecastError::ForecastingError(format!(
            "Need at least {} observations, got {}",
            MIN_SERIES_LENGTH,
            data.len()
        )));
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::ForecastingError(
            "Series contains non-finite values".to_string(),
        ));
    }
    if data.variance() < CONSTANT_VARIANCE {
        return Err(ForecastError::ForecastingError(
            "Series is constant".to_string(),
        ));
    }
    Ok(())
}

/// Train `model` on one column of `series` and forecast `steps` periods
pub fn forecast_column<M: ForecastModel>(
    model: &M,
    series: &MultivariateSeries,
    column: &str,
    steps: usize,
) -> Result<ForecastSeries> {
    validate_steps(steps)?;
    let values = series.column(column).ok_or_else(|| {
        ForecastError::ForecastingError(format!(
            "Unknown column '{}' at '{}'",
            column,
            series.location()
        ))
    })?;
    if values.iter().all(Option::is_none) {
        return Err(ForecastError::ForecastingError(format!(
            "Column '{}' has no values",
            column
        )));
    }
    let history = series
        .complete_column(column)
        .map_err(|e| ForecastError::ForecastingError(e.to_string()))?;
    let last_timestamp = series.last_timestamp().ok_or_else(|| {
        ForecastError::ForecastingError(format!("Series for '{}' is empty", series.location()))
    })?;

    let trained = model.train(&history)?;
    let forecast = trained.forecast(steps)?;
    if forecast.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::ForecastingError(format!(
            "{} produced non-finite forecasts for '{}'",
            trained.name(),
            column
        )));
    }

    ForecastSeries::new(
        series.location(),
        trained.name(),
        future_timestamps(last_timestamp, series.cadence(), steps)?,
        vec![column.to_string()],
        forecast.into_iter().map(|v| vec![v]).collect(),
    )
}

pub mod arima;
pub mod decomposition;

pub use arima::{ArimaModel, TrainedArimaModel};
pub use decomposition::{TrainedTrendSeasonalModel, TrendSeasonalModel};
