//! SMARD chart-data API integration.
//!
//! Two endpoint shapes under `{base}/chart_data/{filter}/{region}/`:
//!
//! - `index_{resolution}.json`: the available snapshot timestamps
//! - `{filter}_{region}_{resolution}_{timestamp}.json`: one series payload
//!
//! The response envelope is observed to vary: sometimes a bare JSON array,
//! sometimes an object carrying the list under `timestamps` / `series`. Both
//! are accepted; anything else is treated as a failed call.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data::SeriesSource;
use crate::domain::RuntimeSettings;

const INDEX_FIELD: &str = "timestamps";
const SERIES_FIELD: &str = "series";

/// A failed remote call. Always recovered by skipping the affected unit.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport { url: String, source: reqwest::Error },
    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: StatusCode },
    #[error("response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },
    #[error("expected a JSON array or an object with `{field}`, got {found}")]
    Shape { field: &'static str, found: &'static str },
}

impl FetchError {
    /// Transport failures and 5xx responses may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => status.is_server_error(),
            FetchError::Decode { .. } | FetchError::Shape { .. } => false,
        }
    }
}

pub struct SmardClient {
    client: Client,
    base_url: String,
    attempts: u32,
    retry_delay: Duration,
}

impl SmardClient {
    pub fn new(settings: &RuntimeSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|source| FetchError::Transport {
                url: settings.api_base_url.clone(),
                source,
            })?;
        Ok(Self {
            client,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            attempts: settings.fetch_attempts.max(1),
            retry_delay: Duration::from_secs(settings.fetch_retry_delay_secs),
        })
    }

    pub fn timestamp_index_url(&self, filter_id: i64, region: &str, resolution: &str) -> String {
        timestamp_index_url(&self.base_url, filter_id, region, resolution)
    }

    pub fn series_url(&self, filter_id: i64, region: &str, resolution: &str, timestamp: i64) -> String {
        series_url(&self.base_url, filter_id, region, resolution, timestamp)
    }

    /// Fetch the timestamp index, surfacing the failure instead of swallowing it.
    pub fn try_fetch_timestamp_index(
        &self,
        filter_id: i64,
        region: &str,
        resolution: &str,
    ) -> Result<Vec<i64>, FetchError> {
        let url = self.timestamp_index_url(filter_id, region, resolution);
        info!("Requesting timestamps from: {url}");
        decode_timestamp_index(self.get_json(&url)?)
    }

    /// Fetch one series payload, surfacing the failure instead of swallowing it.
    pub fn try_fetch_series(
        &self,
        filter_id: i64,
        region: &str,
        resolution: &str,
        timestamp: i64,
    ) -> Result<Vec<Value>, FetchError> {
        let url = self.series_url(filter_id, region, resolution, timestamp);
        info!("Requesting time series data from: {url}");
        decode_series(self.get_json(&url)?)
    }

    fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        self.get_json_with_sleep(url, std::thread::sleep)
    }

    /// GET `url` up to `attempts` times, calling `sleep` between attempts.
    ///
    /// Only retryable failures are retried; nothing sleeps after the last attempt.
    pub fn get_json_with_sleep<S>(&self, url: &str, mut sleep: S) -> Result<Value, FetchError>
    where
        S: FnMut(Duration),
    {
        let mut attempt = 1;
        loop {
            match self.get_json_once(url) {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < self.attempts => {
                    warn!(attempt, max_attempts = self.attempts, "{e}; retrying");
                    sleep(self.retry_delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn get_json_once(&self, url: &str) -> Result<Value, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let text = resp.text().map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

impl SeriesSource for SmardClient {
    fn fetch_timestamp_index(&self, filter_id: i64, region: &str, resolution: &str) -> Vec<i64> {
        self.try_fetch_timestamp_index(filter_id, region, resolution)
            .unwrap_or_else(|e| {
                warn!("Error fetching timestamps: {e}");
                Vec::new()
            })
    }

    fn fetch_series(&self, filter_id: i64, region: &str, resolution: &str, timestamp: i64) -> Vec<Value> {
        self.try_fetch_series(filter_id, region, resolution, timestamp)
            .unwrap_or_else(|e| {
                warn!("Error fetching time series data: {e}");
                Vec::new()
            })
    }
}

pub fn timestamp_index_url(base_url: &str, filter_id: i64, region: &str, resolution: &str) -> String {
    format!("{base_url}/chart_data/{filter_id}/{region}/index_{resolution}.json")
}

pub fn series_url(base_url: &str, filter_id: i64, region: &str, resolution: &str, timestamp: i64) -> String {
    format!("{base_url}/chart_data/{filter_id}/{region}/{filter_id}_{region}_{resolution}_{timestamp}.json")
}

/// Decode an index body: `[..]` or `{"timestamps": [..]}`.
///
/// Elements that are not integers are skipped.
pub fn decode_timestamp_index(body: Value) -> Result<Vec<i64>, FetchError> {
    let items = extract_list(body, INDEX_FIELD)?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match crate::io::normalize::parse_timestamp(&item) {
            Some(ts) => out.push(ts),
            None => debug!("skipping non-integer index entry: {item}"),
        }
    }
    Ok(out)
}

/// Decode a series body: `[..]` or `{"series": [..]}`.
pub fn decode_series(body: Value) -> Result<Vec<Value>, FetchError> {
    extract_list(body, SERIES_FIELD)
}

fn extract_list(body: Value, field: &'static str) -> Result<Vec<Value>, FetchError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove(field) {
            Some(Value::Array(items)) => Ok(items),
            // SMARD answers `null` for snapshots without data.
            Some(Value::Null) => Ok(Vec::new()),
            Some(other) => Err(FetchError::Shape {
                field,
                found: shape_name(&other),
            }),
            None => Err(FetchError::Shape {
                field,
                found: "object without that field",
            }),
        },
        other => Err(FetchError::Shape {
            field,
            found: shape_name(&other),
        }),
    }
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
