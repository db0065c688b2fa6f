//! # Ecosim
//!
//! Aligns irregular ecosystem sensor files into one multivariate series per
//! station and runs counterfactual "what if" forecasts on them.
//!
//! - [`ingest`]: source parsing, per-location merging and the merged dataset artifact
//! - [`forecast`]: VAR training, scenario simulation and single-column fallbacks
//!   (enabled by the default `forecast` feature)
//! - [`math`]: the numeric kernels underneath
//!
//! ## Example
//!
//! ```
//! use ecosim::ingest::{LocationMerger, SourceParser};
//!
//! let parser = SourceParser::default();
//! let temp = parser
//!     .parse(
//!         "RF_Canopy_Temp_FEB-2025.csv",
//!         b"DateTime,Temp\n2025-02-01 00:00:00,20.0\n2025-02-01 02:00:00,22.0\n",
//!     )
//!     .unwrap();
//! let wind = parser
//!     .parse(
//!         "RF_Canopy_Wind_FEB-2025.csv",
//!         b"DateTime,Wind\n2025-02-01 01:00:00,3.0\n",
//!     )
//!     .unwrap();
//!
//! let outcome = LocationMerger::merge_all(&[temp, wind]);
//! let series = &outcome.merged["RainForest"];
//! assert_eq!(series.len(), 3);
//! assert!(series.is_complete());
//! ```

pub use sensor_ingest as ingest;
pub use ts_math as math;

#[cfg(feature = "forecast")]
pub use scenario_forecast as forecast;

#[cfg(feature = "forecast")]
pub use scenario_forecast::{simulate, train, Adjustment, FittedModel, ForecastSeries};
pub use sensor_ingest::MultivariateSeries;
