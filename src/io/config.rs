//! YAML configuration loading.
//!
//! The document uses the upper-case keys of the deployment's `config.yaml`:
//!
//! ```yaml
//! FILTER_IDS:
//!   - [Stromverbrauch Gesamt, 410]
//!   - { label: Wind Onshore, id: 4067 }
//!   - 4169
//! REGIONS: [DE]
//! RESOLUTIONS: [hour, day]
//! TIMESTAMP_MODE: newest
//! ```
//!
//! Values are not checked against the remote API here; a bad filter id only
//! shows up as an empty timestamp index at fetch time.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::domain::{ConfigSpec, FilterSpec, RuntimeSettings, TimestampMode};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Environment variable overriding `DATABASE_URL` from the document.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
/// Environment variable overriding `API_BASE_URL` from the document.
pub const ENV_API_BASE_URL: &str = "SMARD_API_BASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct RawConfig {
    filter_ids: Option<Vec<RawFilter>>,
    regions: Option<Vec<String>>,
    resolutions: Option<Vec<String>>,
    timestamp_mode: Option<TimestampMode>,
    specific_timestamp: Option<i64>,
    database_url: Option<String>,
    api_base_url: Option<String>,
    store_retries: Option<u32>,
    store_retry_delay_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    fetch_attempts: Option<u32>,
    fetch_retry_delay_secs: Option<u64>,
}

/// Accepted shapes for one `FILTER_IDS` element.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFilter {
    Pair(String, i64),
    Labeled { label: String, id: i64 },
    Bare(i64),
}

impl From<RawFilter> for FilterSpec {
    fn from(raw: RawFilter) -> Self {
        match raw {
            RawFilter::Pair(label, id) | RawFilter::Labeled { label, id } => FilterSpec::new(label, id),
            RawFilter::Bare(id) => FilterSpec::new(id.to_string(), id),
        }
    }
}

/// Load the configuration document and apply environment overrides.
pub fn load_config(path: &Path) -> Result<ConfigSpec, ConfigError> {
    dotenvy::dotenv().ok();
    let mut spec = load_config_file(path)?;
    apply_env_overrides(&mut spec, |key| std::env::var(key).ok());
    Ok(spec)
}

/// Load the configuration document without consulting the environment.
pub fn load_config_file(path: &Path) -> Result<ConfigSpec, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a YAML document into a `ConfigSpec`.
pub fn parse_config(contents: &str) -> Result<ConfigSpec, serde_yaml::Error> {
    // An empty document is a valid (if useless) config: every list is empty.
    let raw: RawConfig = if contents.trim().is_empty() {
        RawConfig::default()
    } else {
        serde_yaml::from_str(contents)?
    };

    let defaults = RuntimeSettings::default();
    let runtime = RuntimeSettings {
        database_url: raw.database_url.unwrap_or(defaults.database_url),
        api_base_url: raw.api_base_url.unwrap_or(defaults.api_base_url),
        store_retries: raw.store_retries.unwrap_or(defaults.store_retries),
        store_retry_delay_secs: raw
            .store_retry_delay_secs
            .unwrap_or(defaults.store_retry_delay_secs),
        request_timeout_secs: raw
            .request_timeout_secs
            .unwrap_or(defaults.request_timeout_secs),
        fetch_attempts: raw.fetch_attempts.unwrap_or(defaults.fetch_attempts),
        fetch_retry_delay_secs: raw
            .fetch_retry_delay_secs
            .unwrap_or(defaults.fetch_retry_delay_secs),
    };

    Ok(ConfigSpec {
        filters: raw
            .filter_ids
            .unwrap_or_default()
            .into_iter()
            .map(FilterSpec::from)
            .collect(),
        regions: dedup_preserving_order(raw.regions.unwrap_or_default()),
        resolutions: dedup_preserving_order(raw.resolutions.unwrap_or_default()),
        timestamp_mode: raw.timestamp_mode.unwrap_or_default(),
        specific_timestamp: raw.specific_timestamp,
        runtime,
    })
}

/// Apply `DATABASE_URL` / `SMARD_API_BASE_URL` from the environment.
///
/// `lookup` is the environment accessor; blank values are ignored.
pub fn apply_env_overrides<F>(spec: &mut ConfigSpec, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    if let Some(url) = non_blank(ENV_DATABASE_URL) {
        spec.runtime.database_url = url;
    }
    if let Some(url) = non_blank(ENV_API_BASE_URL) {
        spec.runtime.api_base_url = url;
    }
}

fn dedup_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for v in values {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}
