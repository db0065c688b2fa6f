//! ARIMA models for single sensor columns
//!
//! The series is differenced `d` times and an ARMA(p, q) with intercept is
//! fitted to the result by Hannan–Rissanen two-stage least squares: a long
//! autoregression supplies innovation estimates, which then serve as the
//! moving-average regressors. Forecasts are integrated back to the original
//! scale.

use crate::error::{ForecastError, Result};
use crate::models::{check_univariate, ForecastModel, TrainedForecastModel};
use statrs::statistics::Statistics;
use tracing::debug;
use ts_math::differencing::{difference, integrate};
use ts_math::{least_squares, Matrix};

/// ARIMA model (AutoRegressive Integrated Moving Average)
#[derive(Debug, Clone)]
pub struct ArimaModel {
    /// Name of the model
    name: String,
    /// AR order (p)
    p: usize,
    /// Differencing order (d)
    d: usize,
    /// MA order (q)
    q: usize,
}

/// Trained ARIMA model
#[derive(Debug, Clone)]
pub struct TrainedArimaModel {
    /// Name of the model
    name: String,
    d: usize,
    intercept: f64,
    ar_coefficients: Vec<f64>,
    ma_coefficients: Vec<f64>,
    /// Original-scale history, needed to undo differencing
    historical_data: Vec<f64>,
    /// Differenced history
    differenced: Vec<f64>,
    /// In-sample innovations aligned with `differenced`
    residuals: Vec<f64>,
}

impl ArimaModel {
    /// Create a new ARIMA(p, d, q) model
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self {
            name: format!("ARIMA({},{},{})", p, d, q),
            p,
            d,
            q,
        }
    }

    pub fn order(&self) -> (usize, usize, usize) {
        (self.p, self.d, self.q)
    }

    /// Innovations from a long autoregression, zero where they cannot be formed
    fn long_ar_residuals(&self, diffs: &[f64]) -> Result<(usize, Vec<f64>)> {
        let n = diffs.len();
        let wanted = (self.p + self.q).max((n as f64).ln().ceil() as usize);
        let m = wanted.min(n.saturating_sub(2) / 2);
        if m == 0 {
            return Err(ForecastError::ForecastingError(format!(
                "{} needs more observations to estimate innovations",
                self.name
            )));
        }

        let fit = regress(diffs, m, 0, &[], m)?;
        let mut residuals = vec![0.0; n];
        residuals[m..].copy_from_slice(&fit.residuals.column(0));
        Ok((m, residuals))
    }
}

impl Default for ArimaModel {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

impl ForecastModel for ArimaModel {
    type Trained = TrainedArimaModel;

    fn train(&self, data: &[f64]) -> Result<TrainedArimaModel> {
        check_univariate(data)?;
        if data.len() <= self.d + self.p + self.q + 1 {
            return Err(ForecastError::ForecastingError(format!(
                "Insufficient data for {}. Need more than {} observations.",
                self.name,
                self.d + self.p + self.q + 1
            )));
        }

        let diffs = difference(data, self.d);

        // A constant differenced series is pure drift; ARMA terms are unidentifiable.
        if diffs.as_slice().variance() < 1e-12 {
            debug!(model = %self.name, "differenced series is constant; fitting drift only");
            let drift = diffs.as_slice().mean();
            return Ok(TrainedArimaModel {
                name: self.name.clone(),
                d: self.d,
                intercept: drift,
                ar_coefficients: vec![0.0; self.p],
                ma_coefficients: vec![0.0; self.q],
                historical_data: data.to_vec(),
                residuals: vec![0.0; diffs.len()],
                differenced: diffs,
            });
        }

        let (start, innovations) = if self.q > 0 {
            let (m, residuals) = self.long_ar_residuals(&diffs)?;
            (self.p.max(m + self.q), residuals)
        } else {
            (self.p, Vec::new())
        };

        let fit = regress(&diffs, self.p, self.q, &innovations, start)?;
        let coefficients = fit.coefficients.column(0);
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ForecastError::ForecastingError(format!(
                "{} produced non-finite coefficients",
                self.name
            )));
        }

        let intercept = coefficients[0];
        let ar_coefficients = coefficients[1..1 + self.p].to_vec();
        let ma_coefficients = coefficients[1 + self.p..].to_vec();

        // Re-filter the innovations with the final coefficients.
        let mut residuals = vec![0.0; diffs.len()];
        for t in self.p..diffs.len() {
            let predicted = one_step(
                intercept,
                &ar_coefficients,
                &ma_coefficients,
                &diffs[..t],
                &residuals[..t],
            );
            residuals[t] = diffs[t] - predicted;
        }

        debug!(
            model = %self.name,
            intercept,
            ar = ?ar_coefficients,
            ma = ?ma_coefficients,
            "fitted ARIMA"
        );

        Ok(TrainedArimaModel {
            name: self.name.clone(),
            d: self.d,
            intercept,
            ar_coefficients,
            ma_coefficients,
            historical_data: data.to_vec(),
            differenced: diffs,
            residuals,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedArimaModel {
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar_coefficients
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma_coefficients
    }

    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }
}

impl TrainedForecastModel for TrainedArimaModel {
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        let mut values = self.differenced.clone();
        let mut innovations = self.residuals.clone();

        for _ in 0..horizon {
            let next = one_step(
                self.intercept,
                &self.ar_coefficients,
                &self.ma_coefficients,
                &values,
                &innovations,
            );
            values.push(next);
            innovations.push(0.0);
        }

        let forecasts = &values[self.differenced.len()..];
        Ok(integrate(forecasts, &self.historical_data, self.d)?)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// ARMA prediction of the value following `values`, treating unavailable lags as zero
fn one_step(intercept: f64, ar: &[f64], ma: &[f64], values: &[f64], innovations: &[f64]) -> f64 {
    let lagged = |series: &[f64], lag: usize| {
        series
            .len()
            .checked_sub(lag)
            .map(|i| series[i])
            .unwrap_or(0.0)
    };

    let ar_part: f64 = ar
        .iter()
        .enumerate()
        .map(|(i, phi)| phi * lagged(values, i + 1))
        .sum();
    let ma_part: f64 = ma
        .iter()
        .enumerate()
        .map(|(j, theta)| theta * lagged(innovations, j + 1))
        .sum();

    intercept + ar_part + ma_part
}

/// Regress `values[t]` on `[1, values[t-1..=t-p], innovations[t-1..=t-q]]` for `t >= start`
fn regress(
    values: &[f64],
    p: usize,
    q: usize,
    innovations: &[f64],
    start: usize,
) -> Result<ts_math::LeastSquaresFit> {
    let regressors = 1 + p + q;
    if values.len() <= start + regressors {
        return Err(ForecastError::ForecastingError(format!(
            "Need more than {} observations for {} regressors, have {}",
            start + regressors,
            regressors,
            values.len()
        )));
    }

    let mut design = Vec::with_capacity(values.len() - start);
    let mut targets = Vec::with_capacity(values.len() - start);
    for t in start..values.len() {
        let mut row = Vec::with_capacity(regressors);
        row.push(1.0);
        row.extend((1..=p).map(|lag| values[t - lag]));
        row.extend((1..=q).map(|lag| innovations[t - lag]));
        design.push(row);
        targets.push(vec![values[t]]);
    }

    Ok(least_squares(
        &Matrix::from_rows(&design)?,
        &Matrix::from_rows(&targets)?,
    )?)
}
