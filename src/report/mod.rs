//! Reporting: run summaries and the dashboard read view.
//!
//! The dashboard reads the whole `energy_timeseries` table, derives a datetime
//! from each millisecond timestamp and narrows the rows with label / region /
//! resolution / date-range selections. Nothing here writes to the store.

use chrono::NaiveDate;

use crate::domain::StoredRow;

pub mod format;

pub use format::*;

/// Selections applied to the stored rows. `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardFilter {
    pub filter_label: Option<String>,
    pub region: Option<String>,
    pub resolution: Option<String>,
    /// Inclusive, compared against the UTC date of each row.
    pub from: Option<NaiveDate>,
    /// Inclusive, compared against the UTC date of each row.
    pub to: Option<NaiveDate>,
}

impl DashboardFilter {
    pub fn matches(&self, row: &StoredRow) -> bool {
        let date = row.datetime.date_naive();
        self.filter_label
            .as_deref()
            .is_none_or(|label| row.record.filter_label == label)
            && self
                .region
                .as_deref()
                .is_none_or(|region| row.record.region == region)
            && self
                .resolution
                .as_deref()
                .is_none_or(|resolution| row.record.resolution == resolution)
            && self.from.is_none_or(|from| date >= from)
            && self.to.is_none_or(|to| date <= to)
    }

    /// Matching rows, sorted by datetime (stable for equal datetimes).
    pub fn apply<'a>(&self, rows: &'a [StoredRow]) -> Vec<&'a StoredRow> {
        let mut out: Vec<&StoredRow> = rows.iter().filter(|row| self.matches(row)).collect();
        out.sort_by_key(|row| row.datetime);
        out
    }
}

/// Simple statistics over the non-null values of a row selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueStats {
    pub n_rows: usize,
    pub n_values: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

pub fn value_stats(rows: &[&StoredRow]) -> Option<ValueStats> {
    let values: Vec<f64> = rows.iter().filter_map(|r| r.record.value).collect();
    if values.is_empty() {
        return None;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some(ValueStats {
        n_rows: rows.len(),
        n_values: values.len(),
        min,
        max,
        mean,
    })
}
