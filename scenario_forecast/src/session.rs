//! Caller-owned scenario session
//!
//! Holds one series snapshot and the model trained on it, so repeated
//! scenario runs against the same data do not refit.

use crate::error::Result;
use crate::forecast::ForecastSeries;
use crate::simulator::{run_scenarios, Adjustment};
use crate::var::{FittedModel, VarTrainer};
use sensor_ingest::MultivariateSeries;
use tracing::debug;

#[derive(Debug)]
pub struct ScenarioSession {
    series: MultivariateSeries,
    trainer: VarTrainer,
    model: Option<FittedModel>,
}

impl ScenarioSession {
    /// Start a session; the model is trained on first use
    pub fn new(series: MultivariateSeries, maxlags: usize) -> Result<Self> {
        Ok(Self {
            series,
            trainer: VarTrainer::new(maxlags)?,
            model: None,
        })
    }

    pub fn series(&self) -> &MultivariateSeries {
        &self.series
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    /// The fitted model, training it if needed
    pub fn model(&mut self) -> Result<&FittedModel> {
        let model = match self.model.take() {
            Some(model) => model,
            None => {
                debug!(location = self.series.location(), "training session model");
                self.trainer.fit(&self.series)?
            }
        };
        Ok(&*self.model.insert(model))
    }

    /// Run one scenario
    pub fn run(&mut self, adjustment: &Adjustment, steps: usize) -> Result<ForecastSeries> {
        self.model()?.simulate(adjustment, steps)
    }

    /// Run independent scenarios in parallel against the session model
    pub fn run_many(
        &mut self,
        adjustments: &[Adjustment],
        steps: usize,
    ) -> Result<Vec<Result<ForecastSeries>>> {
        let model = self.model()?;
        Ok(run_scenarios(model, adjustments, steps))
    }

    /// Swap in a new snapshot; the old model is discarded
    pub fn replace_series(&mut self, series: MultivariateSeries) {
        self.series = series;
        self.model = None;
    }
}
