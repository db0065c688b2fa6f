//! TOML configuration for the ingest, modelling and summary stages

use crate::error::{ForecastError, Result};
use crate::models::{ArimaModel, TrendSeasonalModel};
use crate::summary::OllamaSummarizer;
use sensor_ingest::source::MISSING_SENTINEL;
use sensor_ingest::{RoleBindings, SourceParser, StationPrefixes, VariableRole};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration parsed from TOML.
///
/// Every section is optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EcosimConfig {
    /// Source discovery and parsing
    pub ingest: IngestConfig,
    /// Model fitting and forecast horizon
    pub model: ModelConfig,
    /// Per-location role bindings: `[roles.RainForest] temperature = "RainForest_Temp"`
    pub roles: BTreeMap<String, BTreeMap<String, String>>,
    /// Natural-language summary generation
    pub summary: SummaryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Directory holding the per-sensor CSV files
    pub data_dir: PathBuf,
    /// File extension to pick up
    pub extension: String,
    /// Numeric value that marks a missing reading
    pub sentinel: f64,
    /// Two-letter prefix to canonical station name
    pub station_prefixes: StationPrefixes,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            extension: "csv".to_string(),
            sentinel: MISSING_SENTINEL,
            station_prefixes: StationPrefixes::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Largest VAR lag order considered
    pub maxlags: usize,
    /// Forecast horizon in cadence steps
    pub steps: usize,
    /// `(p, d, q)` for the ARIMA fallback
    pub arima_order: [usize; 3],
    /// Season length in periods for the trend + seasonal fallback
    pub season_length: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            maxlags: 15,
            steps: 24,
            arima_order: [1, 1, 1],
            season_length: 24,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SummaryConfig {
    /// Executable invoked as `<command> run <model> <prompt>`
    pub command: String,
    pub model: String,
    pub timeout_secs: u64,
    /// When false the fallback text is used without calling out
    pub enabled: bool,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            command: "ollama".to_string(),
            model: "phi3".to_string(),
            timeout_secs: 60,
            enabled: true,
        }
    }
}

impl EcosimConfig {
    /// Load and validate a configuration file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ForecastError::ConfigError(format!(
                "cannot read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a configuration string
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges, prefixes and role names
    pub fn validate(&self) -> Result<()> {
        if self.model.maxlags == 0 {
            return Err(ForecastError::ConfigError(
                "model.maxlags must be at least 1".to_string(),
            ));
        }
        if self.model.steps == 0 {
            return Err(ForecastError::ConfigError(
                "model.steps must be at least 1".to_string(),
            ));
        }
        if self.model.season_length < 2 {
            return Err(ForecastError::ConfigError(
                "model.season_length must be at least 2".to_string(),
            ));
        }
        if self.summary.timeout_secs == 0 {
            return Err(ForecastError::ConfigError(
                "summary.timeout_secs must be positive".to_string(),
            ));
        }
        self.ingest
            .station_prefixes
            .validate()
            .map_err(|e| ForecastError::ConfigError(format!("ingest.station_prefixes: {}", e)))?;
        for location in self.roles.keys() {
            self.roles_for(location)?;
        }
        Ok(())
    }

    /// Source parser configured with the prefixes and sentinel
    pub fn parser(&self) -> SourceParser {
        SourceParser::new(self.ingest.station_prefixes.clone()).with_sentinel(self.ingest.sentinel)
    }

    /// Role bindings declared for `location`, if any
    pub fn roles_for(&self, location: &str) -> Result<Option<RoleBindings>> {
        let Some(table) = self.roles.get(location) else {
            return Ok(None);
        };
        let mut bindings = RoleBindings::new();
        for (role, column) in table {
            let role: VariableRole = role
                .parse()
                .map_err(|e| ForecastError::ConfigError(format!("roles.{}: {}", location, e)))?;
            bindings.insert(role, column.clone());
        }
        Ok(Some(bindings))
    }

    pub fn arima(&self) -> ArimaModel {
        let [p, d, q] = self.model.arima_order;
        ArimaModel::new(p, d, q)
    }

    pub fn decomposition(&self) -> Result<TrendSeasonalModel> {
        TrendSeasonalModel::new(self.model.season_length)
    }

    /// The configured summarizer, or `None` when summaries are disabled
    pub fn summarizer(&self) -> Option<OllamaSummarizer> {
        self.summary.enabled.then(|| {
            OllamaSummarizer::new(
                &self.summary.command,
                &self.summary.model,
                Duration::from_secs(self.summary.timeout_secs),
            )
        })
    }
}
