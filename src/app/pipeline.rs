//! Ingestion pipeline shared by the CLI entry point and tests.
//!
//! Per run:
//! config check -> store readiness -> for each combination:
//! timestamp index -> timestamp selection -> (series -> normalize -> upsert) per timestamp
//!
//! Failures stay inside the unit they happen in: a bad entry drops one record,
//! an empty or failed fetch skips one timestamp (or one combination when it is
//! the index), a store failure skips one timestamp and the next one reconnects.

use std::time::Duration;

use tracing::{info, warn};

use crate::data::{SeriesSource, SmardClient};
use crate::domain::{Combination, ConfigSpec, TimestampMode};
use crate::error::{AppError, EXIT_STORE_UNAVAILABLE};
use crate::io::normalize::{normalize, to_records};
use crate::store::{Store, StoreConnection, StoreError, open_store, wait_for_store_with_sleep, write_batch};

/// Counters aggregated over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub combinations: usize,
    /// Combinations whose timestamp index came back empty.
    pub combinations_skipped: usize,
    pub timestamps_attempted: usize,
    /// Timestamps whose series yielded no writable record.
    pub timestamps_empty: usize,
    /// Timestamps lost to a connect or write failure.
    pub timestamps_failed: usize,
    pub records_written: usize,
    pub records_dropped: usize,
}

/// Ingest everything `config` selects, against SMARD and the configured store.
pub fn ingest(config: &ConfigSpec) -> Result<RunSummary, AppError> {
    let store = open_store(&config.runtime.database_url);
    let client = SmardClient::new(&config.runtime)?;
    run_ingest(config, &client, store.as_ref(), std::thread::sleep)
}

/// Config check, readiness gate and driver, with injectable collaborators.
///
/// Empty required lists end the run before the store is touched. An
/// unreachable store ends it before anything is fetched.
pub fn run_ingest<S>(
    config: &ConfigSpec,
    source: &dyn SeriesSource,
    store: &dyn Store,
    sleep: S,
) -> Result<RunSummary, AppError>
where
    S: FnMut(Duration),
{
    let missing = config.missing_lists();
    if !missing.is_empty() {
        warn!(
            "Missing configuration values ({}); nothing to ingest.",
            missing.join(", ")
        );
        return Ok(RunSummary::default());
    }

    info!("Waiting for store {}", store.describe());
    let ready = wait_for_store_with_sleep(
        || store.probe(),
        config.runtime.store_retries,
        Duration::from_secs(config.runtime.store_retry_delay_secs),
        sleep,
    );
    if !ready {
        return Err(AppError::new(
            EXIT_STORE_UNAVAILABLE,
            format!(
                "Store {} unavailable after {} attempt(s); aborting.",
                store.describe(),
                config.runtime.store_retries.max(1)
            ),
        ));
    }

    let summary = run_combinations(config, source, store);
    info!("{}", crate::report::format_run_summary(&summary));
    Ok(summary)
}

/// Drive every combination of `config` through fetch, normalize and upsert.
pub fn run_combinations(config: &ConfigSpec, source: &dyn SeriesSource, store: &dyn Store) -> RunSummary {
    let mut summary = RunSummary::default();
    for combination in config.combinations() {
        summary.combinations += 1;
        ingest_combination(config, &combination, source, store, &mut summary);
    }
    summary
}

fn ingest_combination(
    config: &ConfigSpec,
    combination: &Combination,
    source: &dyn SeriesSource,
    store: &dyn Store,
    summary: &mut RunSummary,
) {
    info!("Processing {combination}");
    let filter_id = combination.filter.id;
    let region = combination.region.as_str();
    let resolution = combination.resolution.as_str();

    let index = source.fetch_timestamp_index(filter_id, region, resolution);
    if index.is_empty() {
        info!("No timestamps found for {combination}; skipping.");
        summary.combinations_skipped += 1;
        return;
    }

    let selected = select_timestamps(&index, config.timestamp_mode, config.specific_timestamp);

    // Opened at the first writable batch, dropped after a store failure so the
    // next timestamp reconnects, closed when this function returns.
    let mut conn: Option<Box<dyn StoreConnection>> = None;

    for timestamp in selected {
        summary.timestamps_attempted += 1;

        let raw = source.fetch_series(filter_id, region, resolution, timestamp);
        if raw.is_empty() {
            info!("No time series data for {combination} at {timestamp}; skipping.");
            summary.timestamps_empty += 1;
            continue;
        }

        let points = normalize(&raw);
        let batch = to_records(combination, &points);
        summary.records_dropped += (raw.len() - points.len()) + batch.dropped;
        if batch.records.is_empty() {
            info!(
                "No valid records for {combination} at {timestamp} ({} raw entries); skipping.",
                raw.len()
            );
            summary.timestamps_empty += 1;
            continue;
        }

        if conn.is_none() {
            match open_connection(store) {
                Ok(opened) => conn = Some(opened),
                Err(e) => {
                    warn!("Failed to open store for {combination} at {timestamp}: {e}; skipping timestamp.");
                    summary.timestamps_failed += 1;
                    continue;
                }
            }
        }
        let Some(active) = conn.as_mut() else {
            continue;
        };

        match write_batch(&mut **active, &batch.records) {
            Ok(written) => {
                summary.records_written += written;
                info!("Upserted {written} record(s) for {combination} at {timestamp}.");
            }
            Err(e) => {
                summary.records_written += e.written;
                warn!("Write failed for {combination} at {timestamp}: {e}; skipping timestamp.");
                summary.timestamps_failed += 1;
                conn = None;
            }
        }
    }
}

fn open_connection(store: &dyn Store) -> Result<Box<dyn StoreConnection>, StoreError> {
    let mut conn = store.connect()?;
    conn.ensure_schema()?;
    Ok(conn)
}

/// Pick the snapshot timestamps to fetch from an index.
///
/// The index is sorted ascending and deduplicated first, so `Newest` is the
/// maximum whatever order upstream returned. `Specific` without a configured
/// timestamp falls back to `Newest`; a configured one is used even when the
/// index does not list it.
pub fn select_timestamps(index: &[i64], mode: TimestampMode, specific: Option<i64>) -> Vec<i64> {
    let mut sorted = index.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let newest = || sorted.last().copied().into_iter().collect::<Vec<_>>();

    match mode {
        TimestampMode::Newest => {
            let selected = newest();
            if let Some(ts) = selected.first() {
                info!("Latest timestamp: {ts}");
            }
            selected
        }
        TimestampMode::All => sorted.clone(),
        TimestampMode::Specific => match specific {
            Some(ts) => {
                if sorted.binary_search(&ts).is_err() {
                    warn!("Timestamp {ts} is not listed in the index; fetching it anyway.");
                }
                vec![ts]
            }
            None => {
                warn!("TIMESTAMP_MODE is specific but SPECIFIC_TIMESTAMP is not set; using newest.");
                newest()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use crate::domain::{FilterSpec, RuntimeSettings, StoredRow, TimeSeriesRecord};
    use crate::store::sqlite::SqliteStore;

    type Key = (i64, String, String);

    /// In-memory source; a missing index or series behaves like a failed fetch.
    #[derive(Default)]
    struct FakeSource {
        indexes: HashMap<Key, Vec<i64>>,
        series: HashMap<(i64, String, String, i64), Vec<Value>>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeSource {
        fn with_index(mut self, filter_id: i64, region: &str, resolution: &str, index: &[i64]) -> Self {
            self.indexes
                .insert((filter_id, region.to_string(), resolution.to_string()), index.to_vec());
            self
        }

        fn with_series(mut self, filter_id: i64, region: &str, resolution: &str, ts: i64, body: Value) -> Self {
            let entries = body.as_array().cloned().unwrap_or_default();
            self.series
                .insert((filter_id, region.to_string(), resolution.to_string(), ts), entries);
            self
        }

        fn series_calls(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .filter(|c| c.starts_with("series"))
                .cloned()
                .collect()
        }
    }

    impl SeriesSource for FakeSource {
        fn fetch_timestamp_index(&self, filter_id: i64, region: &str, resolution: &str) -> Vec<i64> {
            self.calls
                .borrow_mut()
                .push(format!("index {filter_id}/{region}/{resolution}"));
            self.indexes
                .get(&(filter_id, region.to_string(), resolution.to_string()))
                .cloned()
                .unwrap_or_default()
        }

        fn fetch_series(&self, filter_id: i64, region: &str, resolution: &str, timestamp: i64) -> Vec<Value> {
            self.calls
                .borrow_mut()
                .push(format!("series {filter_id}/{region}/{resolution}/{timestamp}"));
            self.series
                .get(&(filter_id, region.to_string(), resolution.to_string(), timestamp))
                .cloned()
                .unwrap_or_default()
        }
    }

    /// A store that never accepts connections.
    struct DownStore {
        probes: RefCell<usize>,
    }

    impl Store for DownStore {
        fn describe(&self) -> String {
            "down".to_string()
        }

        fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
            *self.probes.borrow_mut() += 1;
            Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery))
        }
    }

    fn config(filters: Vec<FilterSpec>, regions: &[&str], resolutions: &[&str], mode: TimestampMode) -> ConfigSpec {
        ConfigSpec {
            filters,
            regions: regions.iter().map(|s| s.to_string()).collect(),
            resolutions: resolutions.iter().map(|s| s.to_string()).collect(),
            timestamp_mode: mode,
            specific_timestamp: None,
            runtime: RuntimeSettings {
                store_retries: 3,
                store_retry_delay_secs: 0,
                ..RuntimeSettings::default()
            },
        }
    }

    fn rows(store: &SqliteStore) -> Vec<StoredRow> {
        let mut conn = store.connect().unwrap();
        conn.ensure_schema().unwrap();
        conn.load_all().unwrap()
    }

    #[test]
    fn newest_all_and_specific_selection() {
        let index = [100, 200, 300];
        assert_eq!(select_timestamps(&index, TimestampMode::Newest, None), vec![300]);
        assert_eq!(select_timestamps(&index, TimestampMode::All, None), vec![100, 200, 300]);
        assert_eq!(select_timestamps(&index, TimestampMode::Specific, Some(200)), vec![200]);
    }

    #[test]
    fn specific_without_timestamp_falls_back_to_newest() {
        assert_eq!(select_timestamps(&[100, 200, 300], TimestampMode::Specific, None), vec![300]);
    }

    #[test]
    fn unordered_index_is_sorted_before_selection() {
        let index = [300, 100, 300, 200];
        assert_eq!(select_timestamps(&index, TimestampMode::Newest, None), vec![300]);
        assert_eq!(select_timestamps(&index, TimestampMode::All, None), vec![100, 200, 300]);
        assert!(select_timestamps(&[], TimestampMode::Newest, None).is_empty());
    }

    #[test]
    fn driver_fetches_only_selected_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("energy.db"));

        for (mode, specific, expected) in [
            (TimestampMode::Newest, None, vec!["series 410/DE/hour/300"]),
            (
                TimestampMode::All,
                None,
                vec!["series 410/DE/hour/100", "series 410/DE/hour/200", "series 410/DE/hour/300"],
            ),
            (TimestampMode::Specific, Some(200), vec!["series 410/DE/hour/200"]),
        ] {
            let source = FakeSource::default().with_index(410, "DE", "hour", &[100, 200, 300]);
            let mut cfg = config(vec![FilterSpec::new("load", 410)], &["DE"], &["hour"], mode);
            cfg.specific_timestamp = specific;
            run_combinations(&cfg, &source, &store);
            assert_eq!(source.series_calls(), expected);
        }
    }

    #[test]
    fn failed_combination_does_not_affect_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("energy.db"));

        // A = 410/DE, B = 410/AT (index fetch fails), C = 410/CH.
        let source = FakeSource::default()
            .with_index(410, "DE", "hour", &[1_000])
            .with_series(410, "DE", "hour", 1_000, json!([[1_000, 1.0], [2_000, 2.0]]))
            .with_index(410, "CH", "hour", &[5_000])
            .with_series(410, "CH", "hour", 5_000, json!([[5_000, 5.0]]));
        let cfg = config(
            vec![FilterSpec::new("load", 410)],
            &["DE", "AT", "CH"],
            &["hour"],
            TimestampMode::Newest,
        );

        let summary = run_combinations(&cfg, &source, &store);
        assert_eq!(summary.combinations, 3);
        assert_eq!(summary.combinations_skipped, 1);
        assert_eq!(summary.records_written, 3);

        let regions: Vec<String> = rows(&store).into_iter().map(|r| r.record.region).collect();
        assert_eq!(regions, vec!["DE", "DE", "CH"]);
    }

    #[test]
    fn failed_timestamp_does_not_affect_sibling_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("energy.db"));
        let source = FakeSource::default()
            .with_index(410, "DE", "hour", &[100, 200, 300])
            .with_series(410, "DE", "hour", 100, json!([[100, 1.0]]))
            .with_series(410, "DE", "hour", 300, json!([[300, 3.0], [301], "junk"]));
        let cfg = config(vec![FilterSpec::new("load", 410)], &["DE"], &["hour"], TimestampMode::All);

        let summary = run_combinations(&cfg, &source, &store);
        assert_eq!(
            summary,
            RunSummary {
                combinations: 1,
                combinations_skipped: 0,
                timestamps_attempted: 3,
                timestamps_empty: 1,
                timestamps_failed: 0,
                records_written: 2,
                records_dropped: 2,
            }
        );
        let ts: Vec<i64> = rows(&store).iter().map(|r| r.record.timestamp).collect();
        assert_eq!(ts, vec![100, 300]);
    }

    #[test]
    fn rerunning_converges_to_latest_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("energy.db"));
        let cfg = config(vec![FilterSpec::new("load", 410)], &["DE"], &["hour"], TimestampMode::Newest);

        let first = FakeSource::default()
            .with_index(410, "DE", "hour", &[100])
            .with_series(410, "DE", "hour", 100, json!([[100, 1.0], [101, null]]));
        run_combinations(&cfg, &first, &store);
        run_combinations(&cfg, &first, &store);
        assert_eq!(rows(&store).len(), 2);

        let second = FakeSource::default()
            .with_index(410, "DE", "hour", &[100])
            .with_series(410, "DE", "hour", 100, json!([[100, 1.0], [101, 4.5]]));
        run_combinations(&cfg, &second, &store);

        let values: Vec<Option<f64>> = rows(&store).iter().map(|r| r.record.value).collect();
        assert_eq!(values, vec![Some(1.0), Some(4.5)]);
    }

    #[test]
    fn connect_failure_skips_only_that_timestamp() {
        let source = FakeSource::default()
            .with_index(410, "DE", "hour", &[100, 200])
            .with_series(410, "DE", "hour", 100, json!([[100, 1.0]]))
            .with_series(410, "DE", "hour", 200, json!([[200, 1.0]]))
            .with_index(410, "AT", "hour", &[100])
            .with_series(410, "AT", "hour", 100, json!([[100, 1.0]]));
        let cfg = config(vec![FilterSpec::new("load", 410)], &["DE", "AT"], &["hour"], TimestampMode::All);
        let store = DownStore {
            probes: RefCell::new(0),
        };

        let summary = run_combinations(&cfg, &source, &store);
        assert_eq!(summary.timestamps_attempted, 3);
        assert_eq!(summary.timestamps_failed, 3);
        assert_eq!(summary.records_written, 0);
        // Every timestamp is still fetched and retries the connection.
        assert_eq!(
            source.series_calls(),
            vec!["series 410/DE/hour/100", "series 410/DE/hour/200", "series 410/AT/hour/100"]
        );
        assert_eq!(*store.probes.borrow(), 3);
    }

    /// Wraps a real store; any batch containing `failing_ts` fails to write.
    struct FlakyStore {
        inner: SqliteStore,
        failing_ts: i64,
        connects: RefCell<usize>,
    }

    struct FlakyConnection {
        inner: Box<dyn StoreConnection>,
        failing_ts: i64,
    }

    impl Store for FlakyStore {
        fn describe(&self) -> String {
            self.inner.describe()
        }

        fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
            *self.connects.borrow_mut() += 1;
            Ok(Box::new(FlakyConnection {
                inner: self.inner.connect()?,
                failing_ts: self.failing_ts,
            }))
        }
    }

    impl StoreConnection for FlakyConnection {
        fn ensure_schema(&mut self) -> Result<(), StoreError> {
            self.inner.ensure_schema()
        }

        fn upsert(&mut self, record: &TimeSeriesRecord) -> Result<(), StoreError> {
            if record.timestamp == self.failing_ts {
                return Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery));
            }
            self.inner.upsert(record)
        }

        fn load_all(&mut self) -> Result<Vec<StoredRow>, StoreError> {
            self.inner.load_all()
        }
    }

    #[test]
    fn write_failure_skips_only_that_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let sqlite = SqliteStore::new(dir.path().join("energy.db"));
        let store = FlakyStore {
            inner: sqlite.clone(),
            failing_ts: 100,
            connects: RefCell::new(0),
        };
        let source = FakeSource::default()
            .with_index(410, "DE", "hour", &[100, 200, 300])
            .with_series(410, "DE", "hour", 100, json!([[100, 1.0]]))
            .with_series(410, "DE", "hour", 200, json!([[200, 2.0]]))
            .with_series(410, "DE", "hour", 300, json!([[300, 3.0]]));
        let cfg = config(vec![FilterSpec::new("load", 410)], &["DE"], &["hour"], TimestampMode::All);

        let summary = run_combinations(&cfg, &source, &store);
        assert_eq!(summary.timestamps_attempted, 3);
        assert_eq!(summary.timestamps_failed, 1);
        assert_eq!(summary.records_written, 2);
        // The failed write drops the connection; the next timestamp reopens it.
        assert_eq!(*store.connects.borrow(), 2);

        let ts: Vec<i64> = rows(&sqlite).iter().map(|r| r.record.timestamp).collect();
        assert_eq!(ts, vec![200, 300]);
    }

    #[test]
    fn unreachable_store_aborts_before_any_fetch() {
        let source = FakeSource::default().with_index(410, "DE", "hour", &[100]);
        let store = DownStore {
            probes: RefCell::new(0),
        };
        let cfg = config(vec![FilterSpec::new("load", 410)], &["DE"], &["hour"], TimestampMode::Newest);

        let err = run_ingest(&cfg, &source, &store, |_| {}).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_STORE_UNAVAILABLE);
        assert_eq!(*store.probes.borrow(), 3);
        assert!(source.calls.borrow().is_empty());
    }

    #[test]
    fn empty_config_lists_skip_the_run() {
        let source = FakeSource::default();
        let store = DownStore {
            probes: RefCell::new(0),
        };
        let cfg = config(vec![], &["DE"], &["hour"], TimestampMode::Newest);

        let summary = run_ingest(&cfg, &source, &store, |_| {}).unwrap();
        assert_eq!(summary, RunSummary::default());
        assert_eq!(*store.probes.borrow(), 0);
        assert!(source.calls.borrow().is_empty());
    }

    #[test]
    fn full_run_writes_records_with_labels() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("energy.db"));
        let source = FakeSource::default()
            .with_index(4067, "DE", "quarterhour", &[10, 20])
            .with_series(4067, "DE", "quarterhour", 20, json!([[20, 3.25]]));
        let cfg = config(
            vec![FilterSpec::new("Wind Onshore", 4067)],
            &["DE"],
            &["quarterhour"],
            TimestampMode::Newest,
        );

        let summary = run_ingest(&cfg, &source, &store, |_| {}).unwrap();
        assert_eq!(summary.records_written, 1);
        assert_eq!(
            rows(&store)[0].record,
            TimeSeriesRecord {
                filter_label: "Wind Onshore".to_string(),
                filter_id: 4067,
                region: "DE".to_string(),
                resolution: "quarterhour".to_string(),
                timestamp: 20,
                value: Some(3.25),
            }
        );
    }
}
