//! Utility functions for the scenario_forecast crate

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDateTime};

/// Timestamps for `horizon` steps after `last_timestamp`, spaced by `cadence`
pub fn future_timestamps(
    last_timestamp: NaiveDateTime,
    cadence: Duration,
    horizon: usize,
) -> Result<Vec<NaiveDateTime>> {
    if cadence <= Duration::zero() {
        return Err(ForecastError::InvalidParameter(format!(
            "Cadence must be positive, got {}",
            cadence
        )));
    }

    let mut timestamps = Vec::with_capacity(horizon);
    let mut current = last_timestamp;
    for _ in 0..horizon {
        current = current.checked_add_signed(cadence).ok_or_else(|| {
            ForecastError::InvalidParameter("Forecast timestamps overflow the calendar".to_string())
        })?;
        timestamps.push(current);
    }

    Ok(timestamps)
}

/// Reject a zero forecast horizon
pub fn validate_steps(steps: usize) -> Result<()> {
    if steps == 0 {
        return Err(ForecastError::InvalidParameter(
            "Forecast horizon must be at least one step".to_string(),
        ));
    }
    Ok(())
}
