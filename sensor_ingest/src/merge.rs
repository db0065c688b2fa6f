//! Per-location alignment of source frames
//!
//! Frames are grouped by location and outer-joined on their timestamps. The
//! resulting columns are gap-filled by time-weighted linear interpolation;
//! leading gaps take the first observed value and trailing gaps the last.

use crate::error::{IngestError, Result};
use crate::series::MultivariateSeries;
use crate::source::SourceFrame;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Result of merging every location in a batch
#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// Successfully merged series, keyed by location
    pub merged: BTreeMap<String, MultivariateSeries>,
    /// Locations that could not be merged
    pub failed: Vec<(String, IngestError)>,
}

/// Groups, joins and interpolates source frames
#[derive(Debug)]
pub struct LocationMerger;

impl LocationMerger {
    /// Merge every location present in `frames`
    pub fn merge_all(frames: &[SourceFrame]) -> MergeOutcome {
        let locations: BTreeSet<&str> = frames.iter().map(|f| f.location.as_str()).collect();

        let mut outcome = MergeOutcome::default();
        for location in locations {
            match Self::merge_location(location, frames) {
                Ok(series) => {
                    debug!(
                        location,
                        rows = series.len(),
                        columns = series.width(),
                        "merged location"
                    );
                    outcome.merged.insert(location.to_string(), series);
                }
                Err(e) => {
                    warn!(location, error = %e, "skipping location");
                    outcome.failed.push((location.to_string(), e));
                }
            }
        }
        outcome
    }

    /// Merge the frames belonging to `location`.
    ///
    /// The timestamp set is the union of every contributing frame's
    /// timestamps. Frames sharing a column name are unioned into that column;
    /// coinciding readings are averaged.
    pub fn merge_location(location: &str, frames: &[SourceFrame]) -> Result<MultivariateSeries> {
        let group: Vec<&SourceFrame> = frames.iter().filter(|f| f.location == location).collect();
        if group.is_empty() {
            return Err(IngestError::merge(location, "no contributing files"));
        }

        let mut timestamps: BTreeSet<NaiveDateTime> = BTreeSet::new();
        let mut columns: BTreeMap<String, BTreeMap<NaiveDateTime, Vec<f64>>> = BTreeMap::new();
        let mut undated = 0usize;

        for frame in &group {
            let cells = columns.entry(frame.column_name()).or_default();
            for (ts, value) in frame.timestamps.iter().zip(&frame.values) {
                let Some(ts) = ts else {
                    undated += 1;
                    continue;
                };
                timestamps.insert(*ts);
                let readings = cells.entry(*ts).or_default();
                if let Some(v) = value {
                    readings.push(*v);
                }
            }
        }

        if undated > 0 {
            warn!(location, rows = undated, "dropping rows without a valid timestamp");
        }
        if timestamps.is_empty() {
            return Err(IngestError::merge(location, "no rows with a valid timestamp"));
        }

        let timestamps: Vec<NaiveDateTime> = timestamps.into_iter().collect();
        let merged_columns = columns
            .into_iter()
            .map(|(name, cells)| {
                let mut values: Vec<Option<f64>> = timestamps
                    .iter()
                    .map(|ts| cells.get(ts).and_then(|readings| mean(readings)))
                    .collect();
                interpolate_time(&timestamps, &mut values);
                (name, values)
            })
            .collect();

        MultivariateSeries::new(location, timestamps, merged_columns)
    }
}

/// Order-independent mean of a set of readings
fn mean(readings: &[f64]) -> Option<f64> {
    if readings.is_empty() {
        return None;
    }
    let mut sorted = readings.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(sorted.iter().sum::<f64>() / sorted.len() as f64)
}

/// Fill gaps in `values` in place.
///
/// Interior gaps are interpolated linearly in time between the nearest
/// observed neighbours; leading gaps take the first observation and trailing
/// gaps the last. A column with no observations is left untouched.
pub fn interpolate_time(timestamps: &[NaiveDateTime], values: &mut [Option<f64>]) {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();
    let (Some(&(first, first_value)), Some(&(last, last_value))) = (known.first(), known.last())
    else {
        return;
    };

    for pair in known.windows(2) {
        let ((a, va), (b, vb)) = (pair[0], pair[1]);
        if b - a < 2 {
            continue;
        }
        let span = elapsed(timestamps[a], timestamps[b]);
        for (i, slot) in values.iter_mut().enumerate().take(b).skip(a + 1) {
            let offset = elapsed(timestamps[a], timestamps[i]);
            *slot = Some(va + (vb - va) * offset / span);
        }
    }

    values[..first].iter_mut().for_each(|v| *v = Some(first_value));
    values[last + 1..].iter_mut().for_each(|v| *v = Some(last_value));
}

/// Nanoseconds from `from` to `to`
fn elapsed(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    let d = to - from;
    d.num_nanoseconds()
        .map(|n| n as f64)
        .unwrap_or_else(|| d.num_seconds() as f64 * 1e9)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn minute(m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, 1)
            .unwrap()
            .and_hms_opt(0, m, 0)
            .unwrap()
    }

    #[test]
    fn test_interpolation_is_time_weighted() {
        let ts = vec![minute(0), minute(10), minute(40)];
        let mut values = vec![Some(0.0), None, Some(4.0)];
        interpolate_time(&ts, &mut values);
        assert_eq!(values, vec![Some(0.0), Some(1.0), Some(4.0)]);
    }

    #[test]
    fn test_interpolation_below_one_millisecond() {
        let t0 = minute(0);
        let ts = vec![
            t0,
            t0 + chrono::Duration::microseconds(100),
            t0 + chrono::Duration::microseconds(400),
        ];
        let mut values = vec![Some(1.0), None, Some(5.0)];
        interpolate_time(&ts, &mut values);
        assert_eq!(values, vec![Some(1.0), Some(2.0), Some(5.0)]);
    }

    #[test]
    fn test_interpolation_fills_edges() {
        let ts: Vec<_> = (0..5).map(minute).collect();
        let mut values = vec![None, Some(2.0), None, Some(4.0), None];
        interpolate_time(&ts, &mut values);
        assert_eq!(
            values,
            vec![Some(2.0), Some(2.0), Some(3.0), Some(4.0), Some(4.0)]
        );
    }

    #[test]
    fn test_interpolation_leaves_empty_column_missing() {
        let ts: Vec<_> = (0..3).map(minute).collect();
        let mut values = vec![None; 3];
        interpolate_time(&ts, &mut values);
        assert_eq!(values, vec![None; 3]);
    }

    #[test]
    fn test_interpolation_of_complete_series_is_noop() {
        let ts: Vec<_> = (0..4).map(minute).collect();
        let original = vec![Some(1.0), Some(-3.0), Some(2.5), Some(7.0)];
        let mut values = original.clone();
        interpolate_time(&ts, &mut values);
        assert_eq!(values, original);
    }

    #[test]
    fn test_merge_location_without_frames() {
        let result = LocationMerger::merge_location("Nowhere", &[]);
        assert!(matches!(result, Err(IngestError::MergeError { .. })));
    }

    #[test]
    fn test_merge_averages_coinciding_readings() {
        let frame = |value: f64| SourceFrame {
            location: "Desert".to_string(),
            variable: "Temp".to_string(),
            timestamps: vec![Some(minute(0))],
            values: vec![Some(value)],
        };
        let series = LocationMerger::merge_location("Desert", &[frame(1.0), frame(3.0)]).unwrap();
        assert_eq!(series.column("Desert_Temp").unwrap(), &[Some(2.0)]);
    }
}
