//! Labeled forecast output

use crate::error::{ForecastError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Projected rows at contiguous future timestamps, one value per variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    /// Location the forecast belongs to
    location: String,
    /// Model that produced the forecast, e.g. `VAR(2)`
    model: String,
    timestamps: Vec<NaiveDateTime>,
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl ForecastSeries {
    /// Create a forecast, checking that rows and timestamps line up
    pub fn new(
        location: &str,
        model: &str,
        timestamps: Vec<NaiveDateTime>,
        columns: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if timestamps.len() != rows.len() {
            return Err(ForecastError::DataError(format!(
                "Forecast has {} rows but {} timestamps",
                rows.len(),
                timestamps.len()
            )));
        }
        if let Some(bad) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(ForecastError::DataError(format!(
                "Forecast row {} has {} values, expected {}",
                bad,
                rows[bad].len(),
                columns.len()
            )));
        }

        Ok(Self {
            location: location.to_string(),
            model: model.to_string(),
            timestamps,
            columns,
            rows,
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Number of forecast steps
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every step's value for one column
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// Value of `name` at forecast step `step` (0-based)
    pub fn value(&self, step: usize, name: &str) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.rows.get(step).map(|r| r[idx])
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write as CSV with a leading `DateTime` column
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);

        let mut header = vec!["DateTime".to_string()];
        header.extend(self.columns.iter().cloned());
        csv.write_record(&header)?;

        for (ts, row) in self.timestamps.iter().zip(&self.rows) {
            let mut record = vec![ts.format(sensor_ingest::TIMESTAMP_FORMAT).to_string()];
            record.extend(row.iter().map(|v| v.to_string()));
            csv.write_record(&record)?;
        }

        csv.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> ForecastSeries {
        let t0 = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        ForecastSeries::new(
            "RainForest",
            "VAR(1)",
            vec![t0, t0 + chrono::Duration::hours(1)],
            vec!["Temp".to_string(), "Wind".to_string()],
            vec![vec![20.5, 3.0], vec![21.0, 2.5]],
        )
        .unwrap()
    }

    #[test]
    fn test_column_and_value_lookup() {
        let forecast = sample();
        assert_eq!(forecast.len(), 2);
        assert_eq!(forecast.column("Wind"), Some(vec![3.0, 2.5]));
        assert_eq!(forecast.value(1, "Temp"), Some(21.0));
        assert_eq!(forecast.value(2, "Temp"), None);
        assert_eq!(forecast.column("Rain"), None);
    }

    #[test]
    fn test_new_rejects_mismatched_shapes() {
        let result = ForecastSeries::new("X", "VAR(1)", vec![], vec!["a".to_string()], vec![vec![1.0]]);
        assert!(result.is_err());
    }

    #[test]
    fn test_csv_export() {
        let mut out = Vec::new();
        sample().write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "DateTime,Temp,Wind\n2025-03-01 00:00:00,20.5,3\n2025-03-01 01:00:00,21,2.5\n"
        );
    }

    #[test]
    fn test_json_export() {
        let json = sample().to_json().unwrap();
        let back: ForecastSeries = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample());
    }
}
