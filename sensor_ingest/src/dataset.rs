//! Directory discovery and the merged dataset artifact
//!
//! The merged artifact is a single CSV with columns
//! `DateTime, Location, <Location>_<Variable>…`, one row per
//! `(DateTime, Location)` pair. It is the hand-off to downstream consumers.

use crate::error::{IngestError, Result};
use crate::merge::MergeOutcome;
use crate::series::MultivariateSeries;
use crate::source::{read_measurements, read_timestamps, SourceFrame, SourceParser};
use crate::source::{DATETIME_COLUMN, LOCATION_COLUMN};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Result of loading every file in a directory
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Successfully parsed frames, in file-name order
    pub frames: Vec<SourceFrame>,
    /// Files that were skipped and why
    pub skipped: Vec<(PathBuf, IngestError)>,
}

/// List files in `dir` with the given extension, sorted by name
pub fn discover_files<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if path.is_file() && matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Parse every matching file in `dir`. A bad file is logged and skipped.
pub fn load_directory<P: AsRef<Path>>(
    dir: P,
    parser: &SourceParser,
    extension: &str,
) -> Result<LoadOutcome> {
    let mut outcome = LoadOutcome::default();

    for path in discover_files(dir, extension)? {
        match parser.parse_path(&path) {
            Ok(frame) => {
                info!(
                    file = %path.display(),
                    column = %frame.column_name(),
                    rows = frame.len(),
                    "loaded source file"
                );
                outcome.frames.push(frame);
            }
            Err(e) => {
                error!(file = %path.display(), error = %e, "skipping source file");
                outcome.skipped.push((path, e));
            }
        }
    }

    Ok(outcome)
}

/// Concatenate location series into the artifact table.
///
/// Columns are the sorted union over all locations; a location's rows hold
/// nulls for columns it does not have.
pub fn merged_dataframe<'a, I>(series: I) -> Result<DataFrame>
where
    I: IntoIterator<Item = &'a MultivariateSeries>,
{
    let series: Vec<&MultivariateSeries> = series.into_iter().collect();
    let columns: BTreeSet<&str> = series
        .iter()
        .flat_map(|s| s.column_names().iter().map(String::as_str))
        .collect();

    let mut timestamps = Vec::new();
    let mut locations = Vec::new();
    let mut values: BTreeMap<&str, Vec<Option<f64>>> =
        columns.iter().map(|c| (*c, Vec::new())).collect();

    for s in &series {
        timestamps.extend(
            s.timestamps()
                .iter()
                .map(|t| t.format(crate::TIMESTAMP_FORMAT).to_string()),
        );
        locations.extend(std::iter::repeat(s.location().to_string()).take(s.len()));
        for (name, out) in values.iter_mut() {
            match s.column(name) {
                Some(col) => out.extend_from_slice(col),
                None => out.extend(std::iter::repeat(None).take(s.len())),
            }
        }
    }

    let mut frame = vec![
        Series::new(DATETIME_COLUMN, timestamps),
        Series::new(LOCATION_COLUMN, locations),
    ];
    frame.extend(values.into_iter().map(|(name, col)| Series::new(name, col)));
    Ok(DataFrame::new(frame)?)
}

/// Write the merged artifact to `path`
pub fn write_merged_dataset<'a, P, I>(path: P, series: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a MultivariateSeries>,
{
    let mut df = merged_dataframe(series)?;
    let mut file = File::create(path.as_ref())?;
    CsvWriter::new(&mut file).has_header(true).finish(&mut df)?;
    info!(
        path = %path.as_ref().display(),
        rows = df.height(),
        columns = df.width(),
        "wrote merged dataset"
    );
    Ok(())
}

/// Load the merged artifact back into one series per location.
///
/// Each location keeps only the columns holding at least one value in its rows.
/// A location whose rows do not form a valid series is reported in
/// `failed` without affecting the others.
pub fn read_merged_dataset<P: AsRef<Path>>(path: P) -> Result<MergeOutcome> {
    let file = File::open(path.as_ref())?;
    let df = CsvReader::new(file)
        .infer_schema(None)
        .has_header(true)
        .finish()?;

    let timestamps = read_timestamps(df.column(DATETIME_COLUMN).map_err(|_| {
        IngestError::DataError(format!("Merged dataset has no '{}' column", DATETIME_COLUMN))
    })?)?;
    let locations_col = df
        .column(LOCATION_COLUMN)
        .map_err(|_| {
            IngestError::DataError(format!("Merged dataset has no '{}' column", LOCATION_COLUMN))
        })?
        .cast(&DataType::Utf8)?;
    let locations: Vec<Option<String>> = locations_col
        .utf8()?
        .into_iter()
        .map(|l| l.map(str::to_string))
        .collect();

    let mut data_columns: Vec<(String, Vec<Option<f64>>)> = Vec::new();
    for s in df.get_columns() {
        if s.name() == DATETIME_COLUMN || s.name() == LOCATION_COLUMN {
            continue;
        }
        data_columns.push((s.name().to_string(), read_measurements(s, f64::NAN)?));
    }

    let mut rows_by_location: BTreeMap<String, Vec<(NaiveDateTime, usize)>> = BTreeMap::new();
    for (row, (ts, loc)) in timestamps.iter().zip(&locations).enumerate() {
        if let (Some(ts), Some(loc)) = (ts, loc) {
            rows_by_location.entry(loc.clone()).or_default().push((*ts, row));
        }
    }

    let mut outcome = MergeOutcome::default();
    for (location, mut rows) in rows_by_location {
        rows.sort_by_key(|(ts, _)| *ts);
        let columns = data_columns
            .iter()
            .map(|(name, col)| (name.clone(), rows.iter().map(|(_, r)| col[*r]).collect::<Vec<_>>()))
            .filter(|(_, col)| col.iter().any(Option::is_some))
            .collect();
        let ts = rows.iter().map(|(ts, _)| *ts).collect();
        match MultivariateSeries::new(&location, ts, columns) {
            Ok(series) => {
                outcome.merged.insert(location, series);
            }
            Err(e) => {
                warn!(location = %location, error = %e, "skipping location in merged dataset");
                outcome.failed.push((location, e));
            }
        }
    }

    info!(
        path = %path.as_ref().display(),
        locations = outcome.merged.len(),
        failed = outcome.failed.len(),
        "read merged dataset"
    );
    Ok(outcome)
}
