//! # Sensor Ingest
//!
//! Turns a directory of irregular per-sensor CSV files into one clean
//! multivariate time series per station.
//!
//! ## Pipeline
//!
//! - **Source parsing**: the station and variable come from the file name, the
//!   first column is the timestamp, the first remaining column the measurement,
//!   and `-9999` marks a missing reading
//! - **Location merging**: frames are grouped by station, outer-joined on their
//!   timestamps and gap-filled by time-weighted interpolation
//! - **Merged artifact**: every station's series concatenated into one CSV
//!
//! ## Quick Start
//!
//! ```no_run
//! use sensor_ingest::{dataset, LocationMerger, SourceParser};
//!
//! let parser = SourceParser::default();
//! let loaded = dataset::load_directory("data", &parser, "csv")?;
//! let outcome = LocationMerger::merge_all(&loaded.frames);
//! dataset::write_merged_dataset("merged_data.csv", outcome.merged.values())?;
//! # Ok::<(), sensor_ingest::IngestError>(())
//! ```

pub mod dataset;
pub mod error;
pub mod merge;
pub mod series;
pub mod source;

// Re-export commonly used types
pub use crate::error::{IngestError, Result};
pub use crate::merge::{LocationMerger, MergeOutcome};
pub use crate::series::{MultivariateSeries, RoleBindings, VariableRole};
pub use crate::source::{SourceFrame, SourceParser, StationPrefixes};

/// Layout used when writing timestamps; fractional seconds appear only when present
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
