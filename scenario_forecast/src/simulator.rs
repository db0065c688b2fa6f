//! Counterfactual scenario projection
//!
//! A scenario perturbs the most recent observation of a fitted model's seed
//! window and then rolls the VAR recurrence forward, feeding each projected
//! row back into the lag window.

use crate::error::{ForecastError, Result};
use crate::forecast::ForecastSeries;
use crate::utils::{future_timestamps, validate_steps};
use crate::var::FittedModel;
use rayon::prelude::*;
use sensor_ingest::{MultivariateSeries, VariableRole};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Additive deltas keyed by column name, applied to the last seed row only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Adjustment(BTreeMap<String, f64>);

impl Adjustment {
    /// An empty adjustment, which yields the unperturbed forecast
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, column: &str, delta: f64) -> Self {
        self.insert(column, delta);
        self
    }

    /// Add `delta` to any delta already held for `column`
    pub fn insert(&mut self, column: &str, delta: f64) {
        *self.0.entry(column.to_string()).or_insert(0.0) += delta;
    }

    /// Add a delta for the column bound to `role` in `series`
    pub fn insert_role(
        &mut self,
        series: &MultivariateSeries,
        role: VariableRole,
        delta: f64,
    ) -> Result<()> {
        let column = series.role_column(role).ok_or_else(|| {
            ForecastError::InvalidParameter(format!(
                "No column is bound to role '{}' at '{}'",
                role,
                series.location()
            ))
        })?;
        self.insert(column, delta);
        Ok(())
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.0.get(column).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Adjustment {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut adjustment = Adjustment::new();
        for (column, delta) in iter {
            adjustment.insert(&column.into(), delta);
        }
        adjustment
    }
}

impl FittedModel {
    /// Project `steps` rows ahead after applying `adjustment` to the last seed row
    pub fn simulate(&self, adjustment: &Adjustment, steps: usize) -> Result<ForecastSeries> {
        validate_steps(steps)?;
        let rows = project(self, adjustment, steps)?;
        let timestamps = future_timestamps(self.last_timestamp(), self.cadence(), steps)?;
        ForecastSeries::new(
            self.location(),
            &self.name(),
            timestamps,
            self.columns().to_vec(),
            rows,
        )
    }
}

/// Run a scenario for `series` against the model trained on it.
///
/// The series must be the snapshot the model was fitted on: same location,
/// same columns and same last timestamp.
pub fn simulate(
    series: &MultivariateSeries,
    model: &FittedModel,
    adjustment: &Adjustment,
    steps: usize,
) -> Result<ForecastSeries> {
    if series.location() != model.location() || series.column_names() != model.columns() {
        return Err(ForecastError::SimulationError(format!(
            "Model for '{}' {:?} does not match series for '{}' {:?}",
            model.location(),
            model.columns(),
            series.location(),
            series.column_names()
        )));
    }
    if series.last_timestamp() != Some(model.last_timestamp()) {
        return Err(ForecastError::SimulationError(format!(
            "Model was trained up to {} but the series ends at {:?}; retrain before simulating",
            model.last_timestamp(),
            series.last_timestamp()
        )));
    }

    model.simulate(adjustment, steps)
}

/// Run independent scenarios against one model on the rayon thread pool.
///
/// Results come back in the order of `adjustments`.
pub fn run_scenarios(
    model: &FittedModel,
    adjustments: &[Adjustment],
    steps: usize,
) -> Vec<Result<ForecastSeries>> {
    adjustments
        .par_iter()
        .map(|adjustment| model.simulate(adjustment, steps))
        .collect()
}

/// The recursive multi-step projection
fn project(model: &FittedModel, adjustment: &Adjustment, steps: usize) -> Result<Vec<Vec<f64>>> {
    let p = model.lag_order();
    let seed = model.seed_window();
    if seed.len() < p {
        return Err(ForecastError::SimulationError(format!(
            "Seed window has {} rows but the model needs {}",
            seed.len(),
            p
        )));
    }

    let mut window: VecDeque<Vec<f64>> = seed[seed.len() - p..].iter().cloned().collect();
    if let Some(last) = window.back_mut() {
        for (column, delta) in adjustment.iter() {
            match model.column_index(column) {
                Some(i) => last[i] += delta,
                None => debug!(column, "ignoring adjustment for unknown column"),
            }
        }
    }

    let mut rows = Vec::with_capacity(steps);
    for step in 0..steps {
        let next = model.predict_next(&window);
        if let Some(j) = next.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::SimulationError(format!(
                "Projection diverged at step {} for column '{}'",
                step + 1,
                model.columns()[j]
            )));
        }
        window.pop_front();
        window.push_back(next.clone());
        rows.push(next);
    }

    Ok(rows)
}
