//! Additive trend and seasonal components
//!
//! Contains:
//! - Least-squares linear trend over the observation index
//! - Centred mean seasonal profile of a fixed period

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Linear trend `intercept + slope * t` fitted over `t = 0..n`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearTrend {
    intercept: f64,
    slope: f64,
}

impl LinearTrend {
    /// Fit the trend by least squares; needs at least 2 points
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.len() < 2 {
            return Err(MathError::InsufficientData(
                "Need at least 2 points to fit a linear trend".to_string(),
            ));
        }

        let n = values.len() as f64;
        let x_mean = (values.len() - 1) as f64 / 2.0;
        let y_mean = values.iter().sum::<f64>() / n;

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for (i, &y) in values.iter().enumerate() {
            let x = i as f64;
            numerator += (x - x_mean) * (y - y_mean);
            denominator += (x - x_mean) * (x - x_mean);
        }

        let slope = numerator / denominator;
        if !slope.is_finite() {
            return Err(MathError::CalculationError(
                "Trend slope is not finite".to_string(),
            ));
        }

        Ok(Self {
            intercept: y_mean - slope * x_mean,
            slope,
        })
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// Trend value at index `t`
    pub fn value_at(&self, t: usize) -> f64 {
        self.intercept + self.slope * t as f64
    }

    /// Values minus the fitted trend
    pub fn detrend(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .enumerate()
            .map(|(t, v)| v - self.value_at(t))
            .collect()
    }
}

/// Additive seasonal effects indexed by `t % period`, centred to sum to zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalProfile {
    effects: Vec<f64>,
}

impl SeasonalProfile {
    /// Average the detrended values per phase. Requires two full periods.
    pub fn fit(detrended: &[f64], period: usize) -> Result<Self> {
        if period < 2 {
            return Err(MathError::InvalidInput(
                "Seasonal period must be at least 2".to_string(),
            ));
        }
        if detrended.len() < 2 * period {
            return Err(MathError::InsufficientData(format!(
                "Need at least {} points for a seasonal period of {}, have {}",
                2 * period,
                period,
                detrended.len()
            )));
        }

        let mut sums = vec![0.0; period];
        let mut counts = vec![0usize; period];
        for (t, v) in detrended.iter().enumerate() {
            sums[t % period] += v;
            counts[t % period] += 1;
        }

        let raw: Vec<f64> = sums
            .iter()
            .zip(&counts)
            .map(|(s, &c)| s / c as f64)
            .collect();
        let centre = raw.iter().sum::<f64>() / period as f64;

        Ok(Self {
            effects: raw.iter().map(|e| e - centre).collect(),
        })
    }

    pub fn period(&self) -> usize {
        self.effects.len()
    }

    pub fn effects(&self) -> &[f64] {
        &self.effects
    }

    /// Seasonal effect at index `t`
    pub fn effect_at(&self, t: usize) -> f64 {
        self.effects[t % self.effects.len()]
    }
}
