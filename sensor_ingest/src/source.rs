//! Source file parsing
//!
//! A source file holds one sensor variable for one station. The station and
//! variable are encoded in the file name (`RF_MountainTower_Temp_FEB-2025.csv`),
//! the first column is the timestamp and the first remaining column is the
//! measurement.

use crate::error::{IngestError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Name of the normalized timestamp column
pub const DATETIME_COLUMN: &str = "DateTime";

/// Name of the normalized location column
pub const LOCATION_COLUMN: &str = "Location";

/// Variable name used when the file name carries no variable tokens
pub const FALLBACK_VARIABLE: &str = "Measurement";

/// Reserved value marking a missing reading
pub const MISSING_SENTINEL: f64 = -9999.0;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// Parse a timestamp in any of the accepted layouts.
///
/// Offsets are normalized to UTC and dropped; bare dates map to midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Two-letter station prefixes and the canonical station names they stand for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationPrefixes(BTreeMap<String, String>);

impl Default for StationPrefixes {
    fn default() -> Self {
        let mut prefixes = BTreeMap::new();
        prefixes.insert("RF".to_string(), "RainForest".to_string());
        Self(prefixes)
    }
}

impl StationPrefixes {
    /// An empty prefix table; every location is taken verbatim
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Register a prefix, which must be exactly two ASCII letters
    pub fn insert(&mut self, prefix: &str, station: &str) -> Result<()> {
        Self::check_prefix(prefix)?;
        self.0.insert(prefix.to_ascii_uppercase(), station.to_string());
        Ok(())
    }

    /// Check every registered prefix
    pub fn validate(&self) -> Result<()> {
        self.0.keys().try_for_each(|p| Self::check_prefix(p))
    }

    fn check_prefix(prefix: &str) -> Result<()> {
        if prefix.len() != 2 || !prefix.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(IngestError::DataError(format!(
                "Station prefix '{}' must be exactly two letters",
                prefix
            )));
        }
        Ok(())
    }

    /// Canonical station for a leading file-name token, if a prefix matches
    pub fn lookup(&self, token: &str) -> Option<&str> {
        let upper = token.to_ascii_uppercase();
        self.0
            .iter()
            .find(|(prefix, _)| upper.starts_with(&prefix.to_ascii_uppercase()))
            .map(|(_, station)| station.as_str())
    }
}

/// One parsed source file: `DateTime`, `Location` and a single measurement column
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFrame {
    /// Station the file belongs to
    pub location: String,
    /// Variable name derived from the file name
    pub variable: String,
    /// Timestamps; rows whose timestamp failed to parse are `None`
    pub timestamps: Vec<Option<NaiveDateTime>>,
    /// Measurements; sentinels and unparsable cells are `None`
    pub values: Vec<Option<f64>>,
}

impl SourceFrame {
    /// The unique `"<Location>_<Variable>"` measurement column name
    pub fn column_name(&self) -> String {
        format!("{}_{}", self.location, self.variable)
    }

    /// Output column names, always exactly three
    pub fn column_names(&self) -> [String; 3] {
        [
            DATETIME_COLUMN.to_string(),
            LOCATION_COLUMN.to_string(),
            self.column_name(),
        ]
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// True if no measurement survived parsing
    pub fn is_all_missing(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Render the frame as a three-column DataFrame
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let timestamps: Vec<Option<String>> = self
            .timestamps
            .iter()
            .map(|ts| ts.map(|t| t.format(crate::TIMESTAMP_FORMAT).to_string()))
            .collect();
        let locations = vec![self.location.as_str(); self.len()];

        Ok(DataFrame::new(vec![
            Series::new(DATETIME_COLUMN, timestamps),
            Series::new(LOCATION_COLUMN, locations),
            Series::new(&self.column_name(), self.values.clone()),
        ])?)
    }
}

/// Parser turning raw station files into [`SourceFrame`]s
#[derive(Debug, Clone)]
pub struct SourceParser {
    prefixes: StationPrefixes,
    sentinel: f64,
}

impl Default for SourceParser {
    fn default() -> Self {
        Self::new(StationPrefixes::default())
    }
}

impl SourceParser {
    /// Create a parser with the given station prefixes and the standard sentinel
    pub fn new(prefixes: StationPrefixes) -> Self {
        Self {
            prefixes,
            sentinel: MISSING_SENTINEL,
        }
    }

    /// Use a different missing-value sentinel
    pub fn with_sentinel(mut self, sentinel: f64) -> Self {
        self.sentinel = sentinel;
        self
    }

    pub fn sentinel(&self) -> f64 {
        self.sentinel
    }

    /// Derive `(location, variable)` from a file name or path
    pub fn identify(&self, file_name: &str) -> (String, String) {
        let path = Path::new(file_name);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        let tokens: Vec<&str> = stem.split('_').collect();
        let first = tokens.first().copied().unwrap_or(stem);

        let location = self
            .prefixes
            .lookup(first)
            .map(str::to_string)
            .unwrap_or_else(|| first.to_string());

        let variable = if tokens.len() > 2 {
            tokens[1..tokens.len() - 1].join("_")
        } else {
            FALLBACK_VARIABLE.to_string()
        };

        (location, variable)
    }

    /// Parse one file's raw CSV content
    pub fn parse(&self, file_name: &str, content: &[u8]) -> Result<SourceFrame> {
        let (location, variable) = self.identify(file_name);

        let df = CsvReader::new(Cursor::new(content))
            .infer_schema(None)
            .has_header(true)
            .finish()
            .map_err(|e| IngestError::parse(file_name, e))?;

        let columns = df.get_columns();
        let time_idx = columns
            .iter()
            .position(|s| s.name() == DATETIME_COLUMN)
            .unwrap_or(0);
        let time_series = columns
            .get(time_idx)
            .ok_or_else(|| IngestError::parse(file_name, "file has no columns"))?;
        let timestamps = read_timestamps(time_series).map_err(|e| IngestError::parse(file_name, e))?;

        let mut measurements = columns
            .iter()
            .enumerate()
            .filter(|(i, s)| *i != time_idx && s.name() != LOCATION_COLUMN)
            .map(|(_, s)| s);

        let values = match measurements.next() {
            Some(series) => read_measurements(series, self.sentinel)
                .map_err(|e| IngestError::parse(file_name, e))?,
            None => {
                debug!(file = file_name, "no measurement column; filling with missing values");
                vec![None; timestamps.len()]
            }
        };

        let dropped: Vec<&str> = measurements.map(|s| s.name()).collect();
        if !dropped.is_empty() {
            debug!(file = file_name, ?dropped, "dropping extra measurement columns");
        }

        Ok(SourceFrame {
            location,
            variable,
            timestamps,
            values,
        })
    }

    /// Read and parse one file from disk
    pub fn parse_path<P: AsRef<Path>>(&self, path: P) -> Result<SourceFrame> {
        let path = path.as_ref();
        let name = path.to_string_lossy();
        let content = std::fs::read(path).map_err(|e| IngestError::parse(&name, e))?;
        self.parse(&name, &content)
    }
}

/// Parse a column of timestamps; unparsable cells become `None`
pub(crate) fn read_timestamps(series: &Series) -> PolarsResult<Vec<Option<NaiveDateTime>>> {
    let as_text = series.cast(&DataType::Utf8)?;
    Ok(as_text
        .utf8()?
        .into_iter()
        .map(|cell| cell.and_then(parse_timestamp))
        .collect())
}

/// Read a column as floats, mapping the sentinel and non-numeric cells to `None`
pub(crate) fn read_measurements(series: &Series, sentinel: f64) -> PolarsResult<Vec<Option<f64>>> {
    let as_float = series.cast(&DataType::Float64)?;
    Ok(as_float
        .f64()?
        .into_iter()
        .map(|cell| cell.filter(|v| v.is_finite() && *v != sentinel))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("RF_MountainTower_rad_at10m_FEB-2025.csv", "RainForest", "MountainTower_rad_at10m")]
    #[case("rf_Canopy_Temp_MAR-2025.csv", "RainForest", "Canopy_Temp")]
    #[case("Desert_Temp_2025.csv", "Desert", "Temp")]
    #[case("Desert_2025.csv", "Desert", "Measurement")]
    #[case("Ocean.csv", "Ocean", "Measurement")]
    #[case("data/RF_Soil_Moisture_x_JAN.csv", "RainForest", "Soil_Moisture_x")]
    fn test_identify(#[case] name: &str, #[case] location: &str, #[case] variable: &str) {
        let parser = SourceParser::default();
        assert_eq!(
            parser.identify(name),
            (location.to_string(), variable.to_string())
        );
    }

    #[rstest]
    #[case("2025-02-01 13:00:00", Some((2025, 2, 1, 13, 0)))]
    #[case("2025-02-01T13:30:00", Some((2025, 2, 1, 13, 30)))]
    #[case("2025-02-01 13:30", Some((2025, 2, 1, 13, 30)))]
    #[case("2025-02-01 13:30:00.000000000", Some((2025, 2, 1, 13, 30)))]
    #[case("2025-02-01T14:30:00+01:00", Some((2025, 2, 1, 13, 30)))]
    #[case("02/01/2025 13:30", Some((2025, 2, 1, 13, 30)))]
    #[case("2025-02-01", Some((2025, 2, 1, 0, 0)))]
    #[case("not a date", None)]
    #[case("", None)]
    fn test_parse_timestamp(#[case] raw: &str, #[case] expected: Option<(i32, u32, u32, u32, u32)>) {
        let expected = expected.map(|(y, m, d, h, min)| {
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, 0)
                .unwrap()
        });
        assert_eq!(parse_timestamp(raw), expected);
    }

    #[test]
    fn test_prefix_validation() {
        let mut prefixes = StationPrefixes::empty();
        assert!(prefixes.insert("GL", "Grassland").is_ok());
        assert!(prefixes.insert("GLX", "Grassland").is_err());
        assert!(prefixes.insert("G1", "Grassland").is_err());
        assert_eq!(prefixes.lookup("gl01"), Some("Grassland"));
        assert_eq!(prefixes.lookup("Forest"), None);
    }

    #[test]
    fn test_parse_renames_first_column_and_drops_extras() {
        let csv = "time,temp,humidity\n2025-02-01 00:00:00,21.5,80\n2025-02-01 01:00:00,-9999,81\nbogus,22.0,82\n";
        let frame = SourceParser::default()
            .parse("RF_Canopy_Temp_FEB.csv", csv.as_bytes())
            .unwrap();

        assert_eq!(frame.column_names()[0], "DateTime");
        assert_eq!(frame.column_names()[2], "RainForest_Canopy_Temp");
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.values, vec![Some(21.5), None, Some(22.0)]);
        assert!(frame.timestamps[2].is_none());

        let df = frame.to_dataframe().unwrap();
        assert_eq!(df.width(), 3);
    }

    #[test]
    fn test_parse_without_measurement_column() {
        let csv = "DateTime\n2025-02-01 00:00:00\n2025-02-01 01:00:00\n";
        let frame = SourceParser::default()
            .parse("Desert_Wind_FEB.csv", csv.as_bytes())
            .unwrap();

        assert_eq!(frame.values, vec![None, None]);
        assert!(frame.is_all_missing());
    }

    #[test]
    fn test_parse_rejects_empty_file() {
        let result = SourceParser::default().parse("Desert_Wind_FEB.csv", b"");
        assert!(matches!(result, Err(IngestError::ParseError { .. })));
    }
}
