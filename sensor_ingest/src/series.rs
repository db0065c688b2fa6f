//! Per-location multivariate series

use crate::error::{IngestError, Result};
use crate::source::{DATETIME_COLUMN, LOCATION_COLUMN};
use chrono::{Duration, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Canonical variable roles that scenario adjustments can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableRole {
    Temperature,
    WindSpeed,
    RelativeHumidity,
    Radiation,
}

impl VariableRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableRole::Temperature => "temperature",
            VariableRole::WindSpeed => "wind_speed",
            VariableRole::RelativeHumidity => "relative_humidity",
            VariableRole::Radiation => "radiation",
        }
    }
}

impl fmt::Display for VariableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariableRole {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "temperature" | "temp" => Ok(VariableRole::Temperature),
            "wind_speed" | "wind" => Ok(VariableRole::WindSpeed),
            "relative_humidity" | "humidity" | "rh" => Ok(VariableRole::RelativeHumidity),
            "radiation" | "rad" => Ok(VariableRole::Radiation),
            other => Err(IngestError::RoleError(format!("Unknown variable role '{}'", other))),
        }
    }
}

/// Explicit role → column bindings for one location
pub type RoleBindings = BTreeMap<VariableRole, String>;

/// Cadence assumed when it cannot be inferred
pub fn default_cadence() -> Duration {
    Duration::hours(1)
}

/// Most frequent positive spacing between consecutive timestamps.
///
/// Ties go to the shorter interval. Falls back to one hour with fewer than
/// two timestamps.
pub fn infer_cadence(timestamps: &[NaiveDateTime]) -> Duration {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for pair in timestamps.windows(2) {
        match (pair[1] - pair[0]).num_nanoseconds() {
            Some(step) if step > 0 => *counts.entry(step).or_default() += 1,
            _ => {}
        }
    }

    counts
        .into_iter()
        .max_by(|(step_a, count_a), (step_b, count_b)| {
            count_a.cmp(count_b).then(step_b.cmp(step_a))
        })
        .map(|(step, _)| Duration::nanoseconds(step))
        .unwrap_or_else(default_cadence)
}

/// One location's aligned series: unique ascending timestamps, one column per variable
#[derive(Debug, Clone, PartialEq)]
pub struct MultivariateSeries {
    location: String,
    timestamps: Vec<NaiveDateTime>,
    columns: Vec<String>,
    /// Column-major values
    values: Vec<Vec<Option<f64>>>,
    roles: RoleBindings,
}

impl MultivariateSeries {
    /// Build a series, checking ordering, uniqueness and shape
    pub fn new(
        location: &str,
        timestamps: Vec<NaiveDateTime>,
        columns: Vec<(String, Vec<Option<f64>>)>,
    ) -> Result<Self> {
        if let Some(pos) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(IngestError::DataError(format!(
                "Timestamps for '{}' must be strictly increasing (row {}: {} then {})",
                location,
                pos + 1,
                timestamps[pos],
                timestamps[pos + 1]
            )));
        }

        let mut names = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for (name, column) in columns {
            if column.len() != timestamps.len() {
                return Err(IngestError::DataError(format!(
                    "Column '{}' has {} values but there are {} timestamps",
                    name,
                    column.len(),
                    timestamps.len()
                )));
            }
            if name == DATETIME_COLUMN || name == LOCATION_COLUMN || names.contains(&name) {
                return Err(IngestError::DataError(format!(
                    "Column name '{}' is reserved or duplicated",
                    name
                )));
            }
            names.push(name);
            values.push(column);
        }

        Ok(Self {
            location: location.to_string(),
            timestamps,
            columns: names,
            values,
            roles: RoleBindings::new(),
        })
    }

    /// Build a gap-free series from row-major values
    pub fn from_rows(
        location: &str,
        timestamps: Vec<NaiveDateTime>,
        columns: &[&str],
        rows: &[Vec<f64>],
    ) -> Result<Self> {
        if let Some(bad) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(IngestError::DataError(format!(
                "Row {} has {} values, expected {}",
                bad,
                rows[bad].len(),
                columns.len()
            )));
        }

        let cols = columns
            .iter()
            .enumerate()
            .map(|(j, name)| (name.to_string(), rows.iter().map(|r| Some(r[j])).collect()))
            .collect();
        Self::new(location, timestamps, cols)
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Number of variable columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.column_index(name).map(|i| self.values[i].as_slice())
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.last().copied()
    }

    /// Native spacing of the series
    pub fn cadence(&self) -> Duration {
        infer_cadence(&self.timestamps)
    }

    /// Values of row `i` in column order
    pub fn row(&self, i: usize) -> Vec<Option<f64>> {
        self.values.iter().map(|col| col[i]).collect()
    }

    /// True if the column exists and holds no values at all
    pub fn is_column_empty(&self, name: &str) -> bool {
        self.column(name)
            .map(|col| col.iter().all(Option::is_none))
            .unwrap_or(false)
    }

    /// True if no cell is missing
    pub fn is_complete(&self) -> bool {
        self.values.iter().flatten().all(Option::is_some)
    }

    /// All rows as plain floats; fails if any cell is missing
    pub fn complete_rows(&self) -> Result<Vec<Vec<f64>>> {
        (0..self.len())
            .map(|i| {
                self.values
                    .iter()
                    .zip(&self.columns)
                    .map(|(col, name)| {
                        col[i].ok_or_else(|| {
                            IngestError::DataError(format!(
                                "Column '{}' is missing a value at {}",
                                name, self.timestamps[i]
                            ))
                        })
                    })
                    .collect()
            })
            .collect()
    }

    /// One column as plain floats; fails if it is absent or has gaps
    pub fn complete_column(&self, name: &str) -> Result<Vec<f64>> {
        let column = self
            .column(name)
            .ok_or_else(|| IngestError::DataError(format!("Unknown column '{}'", name)))?;
        column
            .iter()
            .zip(&self.timestamps)
            .map(|(v, ts)| {
                v.ok_or_else(|| {
                    IngestError::DataError(format!(
                        "Column '{}' is missing a value at {}",
                        name, ts
                    ))
                })
            })
            .collect()
    }

    /// Remove columns with no values at all, returning their names
    pub fn drop_empty_columns(&mut self) -> Vec<String> {
        let mut dropped = Vec::new();
        let mut i = 0;
        while i < self.columns.len() {
            if self.values[i].iter().all(Option::is_none) {
                dropped.push(self.columns.remove(i));
                self.values.remove(i);
            } else {
                i += 1;
            }
        }
        self.roles.retain(|_, column| !dropped.contains(column));
        dropped
    }

    /// Attach role bindings, rejecting any that name a column this series lacks
    pub fn bind_roles(&mut self, bindings: &RoleBindings) -> Result<()> {
        for (role, column) in bindings {
            if self.column_index(column).is_none() {
                return Err(IngestError::RoleError(format!(
                    "Role '{}' is bound to '{}', which is not a column of '{}'",
                    role, column, self.location
                )));
            }
        }
        self.roles = bindings.clone();
        Ok(())
    }

    pub fn roles(&self) -> &RoleBindings {
        &self.roles
    }

    /// Column bound to `role`, if any
    pub fn role_column(&self, role: VariableRole) -> Option<&str> {
        self.roles.get(&role).map(String::as_str)
    }

    /// Render as `DateTime, Location, <columns…>`
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let timestamps: Vec<String> = self
            .timestamps
            .iter()
            .map(|t| t.format(crate::TIMESTAMP_FORMAT).to_string())
            .collect();
        let mut series = vec![
            Series::new(DATETIME_COLUMN, timestamps),
            Series::new(LOCATION_COLUMN, vec![self.location.as_str(); self.len()]),
        ];
        for (name, column) in self.columns.iter().zip(&self.values) {
            series.push(Series::new(name, column.clone()));
        }
        Ok(DataFrame::new(series)?)
    }
}
