//! # Scenario Forecast
//!
//! Counterfactual forecasting for aligned ecosystem sensor series.
//!
//! ## Features
//!
//! - Vector autoregression with AIC lag-order selection (falls back to `p = 1`)
//! - Scenario simulation: additive deltas on the latest observation, then a
//!   recursive multi-step projection at the series' native cadence
//! - Independent scenarios run in parallel against one fitted model
//! - Single-column fallbacks: ARIMA(p, d, q) and additive trend + seasonal
//! - Forecast export to JSON and CSV
//! - Plain-text scenario descriptions and an external summary generator with a
//!   fixed fallback
//! - TOML configuration for every stage
//!
//! ## Quick Start
//!
//! ```no_run
//! use scenario_forecast::{simulate, train, Adjustment};
//! use sensor_ingest::dataset;
//!
//! let merged = dataset::read_merged_dataset("merged_data.csv")?.merged;
//! let series = &merged["RainForest"];
//!
//! // Fit once, then compare a warmer scenario against the baseline
//! let model = train(series, 15)?;
//! let baseline = simulate(series, &model, &Adjustment::new(), 24)?;
//! let warmer = simulate(
//!     series,
//!     &model,
//!     &Adjustment::new().with("RainForest_Temp", 1.0),
//!     24,
//! )?;
//!
//! println!("{}", warmer.to_json()?);
//! # let _ = baseline;
//! # Ok::<(), scenario_forecast::ForecastError>(())
//! ```

pub mod config;
pub mod error;
pub mod forecast;
pub mod models;
pub mod session;
pub mod simulator;
pub mod summary;
pub mod utils;
pub mod var;

// Re-export commonly used types
pub use crate::config::EcosimConfig;
pub use crate::error::{ForecastError, Result};
pub use crate::forecast::ForecastSeries;
pub use crate::models::{forecast_column, ForecastModel, TrainedForecastModel};
pub use crate::session::ScenarioSession;
pub use crate::simulator::{run_scenarios, simulate, Adjustment};
pub use crate::summary::{summarize_or_fallback, ScenarioDescription, SummaryGenerator};
pub use crate::var::{train, FittedModel, LagSelection, VarTrainer};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
