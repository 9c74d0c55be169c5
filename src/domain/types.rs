//! Shared domain types.
//!
//! These types are kept small and serializable so they can be:
//!
//! - deserialized straight from the YAML configuration
//! - passed through the fetch/normalize/write pipeline by reference
//! - reloaded from the store for the dashboard read side

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which snapshot timestamps of an index get fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampMode {
    /// Only the most recent snapshot.
    #[default]
    Newest,
    /// Every snapshot listed in the index.
    All,
    /// The snapshot named by `SPECIFIC_TIMESTAMP`.
    Specific,
}

/// One upstream filter (data series) identifier with its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub label: String,
    pub id: i64,
}

impl FilterSpec {
    pub fn new(label: impl Into<String>, id: i64) -> Self {
        Self {
            label: label.into(),
            id,
        }
    }
}

/// Run configuration, loaded once and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSpec {
    pub filters: Vec<FilterSpec>,
    pub regions: Vec<String>,
    pub resolutions: Vec<String>,
    pub timestamp_mode: TimestampMode,
    pub specific_timestamp: Option<i64>,
    pub runtime: RuntimeSettings,
}

impl ConfigSpec {
    /// Names of the required lists that are empty.
    ///
    /// Ingestion is skipped entirely unless this is empty.
    pub fn missing_lists(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.filters.is_empty() {
            missing.push("FILTER_IDS");
        }
        if self.regions.is_empty() {
            missing.push("REGIONS");
        }
        if self.resolutions.is_empty() {
            missing.push("RESOLUTIONS");
        }
        missing
    }

    /// Cross-product `filters × regions × resolutions` in configuration order.
    pub fn combinations(&self) -> Vec<Combination> {
        let mut out =
            Vec::with_capacity(self.filters.len() * self.regions.len() * self.resolutions.len());
        for filter in &self.filters {
            for region in &self.regions {
                for resolution in &self.resolutions {
                    out.push(Combination {
                        filter: filter.clone(),
                        region: region.clone(),
                        resolution: resolution.clone(),
                    });
                }
            }
        }
        out
    }
}

/// Connection and retry knobs that are not part of the data selection.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub database_url: String,
    pub api_base_url: String,
    pub store_retries: u32,
    pub store_retry_delay_secs: u64,
    pub request_timeout_secs: u64,
    pub fetch_attempts: u32,
    pub fetch_retry_delay_secs: u64,
}

pub const DEFAULT_DATABASE_URL: &str = "postgres://user:password@db/energydata";
pub const DEFAULT_API_BASE_URL: &str = "https://www.smard.de/app";

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            store_retries: 10,
            store_retry_delay_secs: 2,
            request_timeout_secs: 60,
            fetch_attempts: 1,
            fetch_retry_delay_secs: 1,
        }
    }
}

/// One unit of iteration: a (filter, region, resolution) tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combination {
    pub filter: FilterSpec,
    pub region: String,
    pub resolution: String,
}

impl std::fmt::Display for Combination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) / {} / {}",
            self.filter.label, self.filter.id, self.region, self.resolution
        )
    }
}

/// The unit persisted to `energy_timeseries`.
///
/// Identity key: `(filter_id, region, resolution, timestamp)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    pub filter_label: String,
    pub filter_id: i64,
    pub region: String,
    pub resolution: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// `None` marks a gap in the upstream series.
    pub value: Option<f64>,
}

/// A persisted row as seen by read-side consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRow {
    pub id: i64,
    pub record: TimeSeriesRecord,
    pub datetime: DateTime<Utc>,
}

impl StoredRow {
    /// Build a row, deriving `datetime` from the millisecond timestamp.
    ///
    /// Returns `None` for timestamps outside chrono's representable range.
    pub fn new(id: i64, record: TimeSeriesRecord) -> Option<Self> {
        let datetime = DateTime::<Utc>::from_timestamp_millis(record.timestamp)?;
        Some(Self {
            id,
            record,
            datetime,
        })
    }
}
