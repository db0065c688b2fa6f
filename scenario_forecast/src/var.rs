//! Vector autoregression: lag-order selection and least-squares fitting
//!
//! Each variable's next value is modelled as an intercept plus a linear
//! combination of the previous `p` rows of every variable. The lag order is
//! chosen by minimising the Akaike information criterion over a common
//! estimation sample:
//!
//! ```text
//! AIC(p) = ln det Σ̂(p) + 2 (p k² + k) / n
//! ```
//!
//! where `Σ̂(p)` is the maximum-likelihood residual covariance, `k` the number
//! of variables and `n` the number of usable rows.

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDateTime};
use sensor_ingest::MultivariateSeries;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};
use ts_math::linalg::log_determinant_spd;
use ts_math::{least_squares, LeastSquaresFit, Matrix};

/// How the lag order of a fitted model was chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LagSelection {
    /// Chosen by the information criterion
    Criterion { aic: f64 },
    /// No candidate could be scored, so `p = 1` was used
    Fallback { reason: String },
}

/// A fitted VAR(p) model together with the rows needed to seed forecasts
#[derive(Debug, Clone)]
pub struct FittedModel {
    location: String,
    columns: Vec<String>,
    lag_order: usize,
    intercepts: Vec<f64>,
    /// `lag_coefficients[l][i][j]`: weight of variable `j` at lag `l + 1` in the equation for `i`
    lag_coefficients: Vec<Vec<Vec<f64>>>,
    residual_covariance: Matrix,
    nobs: usize,
    seed_window: Vec<Vec<f64>>,
    last_timestamp: NaiveDateTime,
    cadence: Duration,
    selection: LagSelection,
    regularized: bool,
}

impl FittedModel {
    /// Display name, e.g. `VAR(2)`
    pub fn name(&self) -> String {
        format!("VAR({})", self.lag_order)
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn lag_order(&self) -> usize {
        self.lag_order
    }

    pub fn intercepts(&self) -> &[f64] {
        &self.intercepts
    }

    /// Weight of `source` at `lag` (1-based) in the equation for `target`
    pub fn coefficient(&self, lag: usize, target: &str, source: &str) -> Option<f64> {
        if lag == 0 || lag > self.lag_order {
            return None;
        }
        let i = self.column_index(target)?;
        let j = self.column_index(source)?;
        Some(self.lag_coefficients[lag - 1][i][j])
    }

    /// Maximum-likelihood residual covariance of the fit
    pub fn residual_covariance(&self) -> &Matrix {
        &self.residual_covariance
    }

    /// Rows used to estimate the coefficients
    pub fn nobs(&self) -> usize {
        self.nobs
    }

    /// The last `p` training rows, oldest first
    pub fn seed_window(&self) -> &[Vec<f64>] {
        &self.seed_window
    }

    pub fn last_timestamp(&self) -> NaiveDateTime {
        self.last_timestamp
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    pub fn selection(&self) -> &LagSelection {
        &self.selection
    }

    /// AIC of the selected order, if selection succeeded
    pub fn aic(&self) -> Option<f64> {
        match self.selection {
            LagSelection::Criterion { aic } => Some(aic),
            LagSelection::Fallback { .. } => None,
        }
    }

    /// True if the lag order fell back to 1
    pub fn is_fallback(&self) -> bool {
        matches!(self.selection, LagSelection::Fallback { .. })
    }

    /// True if the final fit needed ridge regularization
    pub fn is_regularized(&self) -> bool {
        self.regularized
    }

    /// One-step prediction from a window of exactly `p` rows, oldest first
    pub fn predict_next(&self, window: &VecDeque<Vec<f64>>) -> Vec<f64> {
        let mut next = self.intercepts.clone();
        for (lag, coefficients) in self.lag_coefficients.iter().enumerate() {
            let row = &window[window.len() - 1 - lag];
            for (i, weights) in coefficients.iter().enumerate() {
                next[i] += weights.iter().zip(row).map(|(w, y)| w * y).sum::<f64>();
            }
        }
        next
    }
}

/// Fits VAR models with AIC lag selection
#[derive(Debug, Clone)]
pub struct VarTrainer {
    maxlags: usize,
}

impl VarTrainer {
    /// Create a trainer that considers lag orders `1..=maxlags`
    pub fn new(maxlags: usize) -> Result<Self> {
        if maxlags == 0 {
            return Err(ForecastError::InvalidParameter(
                "maxlags must be at least 1".to_string(),
            ));
        }
        Ok(Self { maxlags })
    }

    pub fn maxlags(&self) -> usize {
        self.maxlags
    }

    /// Fit a model on a gap-free series
    pub fn fit(&self, series: &MultivariateSeries) -> Result<FittedModel> {
        if series.width() == 0 {
            return Err(ForecastError::DataError(format!(
                "Series for '{}' has no variable columns",
                series.location()
            )));
        }
        let rows = series.complete_rows().map_err(|e| {
            ForecastError::DataError(format!("Training series must be gap-free: {}", e))
        })?;
        let last_timestamp = match series.last_timestamp() {
            Some(ts) if rows.len() >= 2 => ts,
            _ => {
                return Err(ForecastError::InsufficientData(format!(
                    "Series for '{}' has {} rows; a VAR needs at least 2",
                    series.location(),
                    rows.len()
                )))
            }
        };

        let max_order = self.maxlags.min(rows.len() - 1);
        let (lag_order, selection) = match select_order(&rows, max_order) {
            Ok((p, aic)) => (p, LagSelection::Criterion { aic }),
            Err(reason) => {
                warn!(
                    location = series.location(),
                    %reason,
                    "lag order selection failed; falling back to p = 1"
                );
                (1, LagSelection::Fallback { reason })
            }
        };

        if rows.len() < lag_order + 1 {
            return Err(ForecastError::InsufficientData(format!(
                "Need at least {} rows for lag order {}, have {}",
                lag_order + 1,
                lag_order,
                rows.len()
            )));
        }

        let fit = fit_lag(&rows, lag_order, 0)?;
        if fit.is_regularized() {
            warn!(
                location = series.location(),
                lag_order, "design matrix is rank-deficient; coefficients are ridge-regularized"
            );
        }
        if !fit.coefficients.is_finite() {
            return Err(ForecastError::InsufficientData(
                "VAR coefficients are not finite".to_string(),
            ));
        }

        let k = series.width();
        let intercepts = fit.coefficients.row(0);
        let lag_coefficients = (0..lag_order)
            .map(|l| {
                (0..k)
                    .map(|i| (0..k).map(|j| fit.coefficients.get(1 + l * k + j, i)).collect())
                    .collect()
            })
            .collect();

        info!(
            location = series.location(),
            lag_order,
            variables = k,
            rows = rows.len(),
            "fitted VAR model"
        );

        Ok(FittedModel {
            location: series.location().to_string(),
            columns: series.column_names().to_vec(),
            lag_order,
            intercepts,
            lag_coefficients,
            residual_covariance: fit.residual_covariance()?,
            nobs: fit.residuals.rows(),
            seed_window: rows[rows.len() - lag_order..].to_vec(),
            last_timestamp,
            cadence: series.cadence(),
            selection,
            regularized: fit.is_regularized(),
        })
    }
}

/// Train a VAR model on `series`, considering lag orders up to `maxlags`
pub fn train(series: &MultivariateSeries, maxlags: usize) -> Result<FittedModel> {
    VarTrainer::new(maxlags)?.fit(series)
}

/// Least-squares fit of a VAR(p) on `rows[start..]`
fn fit_lag(rows: &[Vec<f64>], p: usize, start: usize) -> Result<LeastSquaresFit> {
    let mut design = Vec::with_capacity(rows.len().saturating_sub(start + p));
    let mut targets = Vec::with_capacity(design.capacity());
    for t in start + p..rows.len() {
        let mut z = Vec::with_capacity(1 + p * rows[t].len());
        z.push(1.0);
        for lag in 1..=p {
            z.extend_from_slice(&rows[t - lag]);
        }
        design.push(z);
        targets.push(rows[t].clone());
    }

    Ok(least_squares(
        &Matrix::from_rows(&design)?,
        &Matrix::from_rows(&targets)?,
    )?)
}

/// Pick the AIC-minimising order in `1..=max_order` over a common sample.
///
/// Candidates whose design is rank-deficient or whose residual covariance is
/// singular are skipped. Returns the reason when no candidate can be scored.
fn select_order(rows: &[Vec<f64>], max_order: usize) -> std::result::Result<(usize, f64), String> {
    if max_order == 0 {
        return Err("series too short to select a lag order".to_string());
    }
    let k = rows[0].len();
    let n = rows.len() - max_order;

    let mut best: Option<(usize, f64)> = None;
    for p in 1..=max_order {
        let regressors = 1 + k * p;
        if n <= regressors {
            debug!(p, n, regressors, "skipping lag order: too few rows");
            continue;
        }
        let fit = match fit_lag(rows, p, max_order - p) {
            Ok(fit) if !fit.is_regularized() => fit,
            Ok(_) => {
                debug!(p, "skipping lag order: rank-deficient design");
                continue;
            }
            Err(e) => {
                debug!(p, error = %e, "skipping lag order");
                continue;
            }
        };
        let Some(log_det) = fit
            .residual_covariance()
            .ok()
            .and_then(|sigma| log_determinant_spd(&sigma))
        else {
            debug!(p, "skipping lag order: singular residual covariance");
            continue;
        };

        let free_params = (p * k * k + k) as f64;
        let aic = log_det + 2.0 * free_params / n as f64;
        debug!(p, aic, "scored lag order");
        if aic.is_finite() && best.map_or(true, |(_, b)| aic < b) {
            best = Some((p, aic));
        }
    }

    best.ok_or_else(|| {
        format!(
            "no lag order in 1..={} could be scored on {} rows of {} variables",
            max_order,
            rows.len(),
            k
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn hourly(rows: &[Vec<f64>], columns: &[&str]) -> MultivariateSeries {
        let t0 = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let ts = (0..rows.len() as i64).map(|h| t0 + Duration::hours(h)).collect();
        MultivariateSeries::from_rows("Test", ts, columns, rows).unwrap()
    }

    #[test]
    fn test_predict_next_uses_lags_in_order() {
        let model = FittedModel {
            location: "Test".to_string(),
            columns: vec!["a".to_string()],
            lag_order: 2,
            intercepts: vec![1.0],
            lag_coefficients: vec![vec![vec![0.5]], vec![vec![0.25]]],
            residual_covariance: Matrix::identity(1),
            nobs: 10,
            seed_window: vec![vec![4.0], vec![8.0]],
            last_timestamp: NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            cadence: Duration::hours(1),
            selection: LagSelection::Criterion { aic: 0.0 },
            regularized: false,
        };
        let window: VecDeque<Vec<f64>> = model.seed_window().iter().cloned().collect();

        // 1 + 0.5 * 8 + 0.25 * 4
        assert_relative_eq!(model.predict_next(&window)[0], 6.0);
        assert_eq!(model.coefficient(2, "a", "a"), Some(0.25));
        assert_eq!(model.coefficient(3, "a", "a"), None);
    }

    #[test]
    fn test_fit_recovers_ar1_coefficients() {
        // a_t = 2 + 0.5 a_{t-1} + e, b_t = 1 + 0.2 a_{t-1} + 0.3 b_{t-1} + e
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 0.1).unwrap();
        let mut rows = vec![vec![4.0, 2.5]];
        for t in 1..2000 {
            let prev = rows[t - 1].clone();
            rows.push(vec![
                2.0 + 0.5 * prev[0] + noise.sample(&mut rng),
                1.0 + 0.2 * prev[0] + 0.3 * prev[1] + noise.sample(&mut rng),
            ]);
        }
        let series = hourly(&rows, &["a", "b"]);
        let model = train(&series, 1).unwrap();

        assert_eq!(model.lag_order(), 1);
        assert!(!model.is_fallback());
        assert!(!model.is_regularized());
        assert_relative_eq!(model.coefficient(1, "a", "a").unwrap(), 0.5, epsilon = 0.1);
        assert_relative_eq!(model.coefficient(1, "b", "a").unwrap(), 0.2, epsilon = 0.1);
        assert_relative_eq!(model.coefficient(1, "b", "b").unwrap(), 0.3, epsilon = 0.1);
        assert_eq!(model.seed_window(), &rows[1999..]);
        assert_eq!(model.nobs(), 1999);
    }

    #[test]
    fn test_zero_maxlags_is_rejected() {
        assert!(matches!(
            VarTrainer::new(0),
            Err(ForecastError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_select_order_reports_failure_on_tiny_sample() {
        let rows = vec![vec![1.0], vec![2.0], vec![3.0]];
        assert!(select_order(&rows, 2).is_err());
    }
}
