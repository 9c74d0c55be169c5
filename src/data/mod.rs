//! Remote data sources.

use serde_json::Value;

pub mod smard;

pub use smard::{FetchError, SmardClient};

/// Where timestamp indexes and series payloads come from.
///
/// Both calls are fail-soft: an unreachable source or a bad response yields an
/// empty sequence so the caller can carry on with the next unit of work.
pub trait SeriesSource {
    fn fetch_timestamp_index(&self, filter_id: i64, region: &str, resolution: &str) -> Vec<i64>;

    fn fetch_series(&self, filter_id: i64, region: &str, resolution: &str, timestamp: i64) -> Vec<Value>;
}
