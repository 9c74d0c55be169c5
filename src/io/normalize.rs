//! Series payload normalization.
//!
//! Turns the loosely typed `[timestamp, value]` entries of a series payload into
//! records that are safe to write.
//!
//! Two stages:
//! - `normalize` keeps the first two elements of every entry that is a sequence
//!   of length ≥ 2, without looking at their types
//! - `to_records` types each point for one combination (integer epoch-ms
//!   timestamp, numeric or null value)
//!
//! Anything that fails either stage is dropped with a diagnostic; neither stage
//! deduplicates (the store's composite key does that).

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::domain::{Combination, TimeSeriesRecord};

/// First two elements of a raw series entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub timestamp: Value,
    pub value: Value,
}

/// Why a raw entry or point was dropped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedEntry {
    #[error("entry is not a sequence: {0}")]
    NotASequence(Value),
    #[error("entry has {0} element(s), expected at least 2")]
    TooShort(usize),
    #[error("timestamp is not an integer: {0}")]
    BadTimestamp(Value),
    #[error("value is neither a number nor null: {0}")]
    BadValue(Value),
}

/// Keep `[timestamp, value]` from each entry shaped as a sequence of length ≥ 2.
pub fn normalize(raw_entries: &[Value]) -> Vec<SeriesPoint> {
    let mut points = Vec::with_capacity(raw_entries.len());
    for (idx, entry) in raw_entries.iter().enumerate() {
        match split_entry(entry) {
            Ok(point) => points.push(point),
            Err(e) => debug!(index = idx, "dropping series entry: {e}"),
        }
    }
    points
}

fn split_entry(entry: &Value) -> Result<SeriesPoint, MalformedEntry> {
    let items = entry
        .as_array()
        .ok_or_else(|| MalformedEntry::NotASequence(entry.clone()))?;
    match items.as_slice() {
        [timestamp, value, ..] => Ok(SeriesPoint {
            timestamp: timestamp.clone(),
            value: value.clone(),
        }),
        short => Err(MalformedEntry::TooShort(short.len())),
    }
}

impl SeriesPoint {
    /// Type this point as a record of `combination`.
    pub fn to_record(&self, combination: &Combination) -> Result<TimeSeriesRecord, MalformedEntry> {
        let timestamp = parse_timestamp(&self.timestamp)
            .ok_or_else(|| MalformedEntry::BadTimestamp(self.timestamp.clone()))?;
        let value = match &self.value {
            Value::Null => None,
            Value::Number(n) => Some(
                n.as_f64()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| MalformedEntry::BadValue(self.value.clone()))?,
            ),
            other => return Err(MalformedEntry::BadValue(other.clone())),
        };
        Ok(TimeSeriesRecord {
            filter_label: combination.filter.label.clone(),
            filter_id: combination.filter.id,
            region: combination.region.clone(),
            resolution: combination.resolution.clone(),
            timestamp,
            value,
        })
    }
}

/// Epoch-ms timestamp from an integer, or from a float with no fractional part.
pub fn parse_timestamp(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Outcome of typing a batch of points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedBatch {
    pub records: Vec<TimeSeriesRecord>,
    pub dropped: usize,
}

/// Type every point for `combination`, dropping the malformed ones.
pub fn to_records(combination: &Combination, points: &[SeriesPoint]) -> TypedBatch {
    let mut batch = TypedBatch {
        records: Vec::with_capacity(points.len()),
        dropped: 0,
    };
    for point in points {
        match point.to_record(combination) {
            Ok(record) => batch.records.push(record),
            Err(e) => {
                batch.dropped += 1;
                debug!(combination = %combination, "dropping series point: {e}");
            }
        }
    }
    batch
}
