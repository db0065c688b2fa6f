//! Additive trend + seasonal model
//!
//! `y_t = a + b t + s_{t mod m}`: a least-squares line plus a centred
//! per-phase mean of the detrended values. The seasonal part is only fitted
//! when the history covers at least two full seasons.

use crate::error::{ForecastError, Result};
use crate::models::{check_univariate, ForecastModel, TrainedForecastModel};
use tracing::debug;
use ts_math::trend::{LinearTrend, SeasonalProfile};

/// Additive trend + seasonal decomposition model
#[derive(Debug, Clone)]
pub struct TrendSeasonalModel {
    name: String,
    season_length: usize,
}

/// Trained trend + seasonal model
#[derive(Debug, Clone)]
pub struct TrainedTrendSeasonalModel {
    name: String,
    trend: LinearTrend,
    seasonal: Option<SeasonalProfile>,
    /// Number of training observations
    n: usize,
}

impl TrendSeasonalModel {
    /// Create a model with the given season length in periods (24 for a daily cycle of hourly data)
    pub fn new(season_length: usize) -> Result<Self> {
        if season_length < 2 {
            return Err(ForecastError::InvalidParameter(format!(
                "Season length must be at least 2, got {}",
                season_length
            )));
        }
        Ok(Self {
            name: format!("TrendSeasonal({})", season_length),
            season_length,
        })
    }

    pub fn season_length(&self) -> usize {
        self.season_length
    }
}

impl ForecastModel for TrendSeasonalModel {
    type Trained = TrainedTrendSeasonalModel;

    fn train(&self, data: &[f64]) -> Result<TrainedTrendSeasonalModel> {
        check_univariate(data)?;

        let trend = LinearTrend::fit(data)?;
        let seasonal = if data.len() >= 2 * self.season_length {
            Some(SeasonalProfile::fit(&trend.detrend(data), self.season_length)?)
        } else {
            debug!(
                observations = data.len(),
                season_length = self.season_length,
                "history shorter than two seasons; fitting trend only"
            );
            None
        };

        Ok(TrainedTrendSeasonalModel {
            name: self.name.clone(),
            trend,
            seasonal,
            n: data.len(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedTrendSeasonalModel {
    pub fn trend(&self) -> &LinearTrend {
        &self.trend
    }

    pub fn seasonal(&self) -> Option<&SeasonalProfile> {
        self.seasonal.as_ref()
    }
}

impl TrainedForecastModel for TrainedTrendSeasonalModel {
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        Ok((self.n..self.n + horizon)
            .map(|t| {
                self.trend.value_at(t) + self.seasonal.as_ref().map_or(0.0, |s| s.effect_at(t))
            })
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
