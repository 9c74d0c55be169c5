//! Destination store for `energy_timeseries`.
//!
//! The store owns the schema and the composite uniqueness constraint
//! `(filter_id, region, resolution, timestamp)`. Writes are upserts: a repeated
//! key overwrites `value` and `filter_label`, so re-running ingestion over the
//! same snapshots converges to the same table.
//!
//! Backends are picked from the store URL:
//! - `postgres://…` / `postgresql://…` → PostgreSQL
//! - `sqlite://<path>` or a bare path → SQLite

use thiserror::Error;

use crate::domain::{StoredRow, TimeSeriesRecord};

pub mod pg;
pub mod readiness;
pub mod sqlite;

pub use readiness::{wait_for_store, wait_for_store_with_sleep};

pub const TABLE: &str = "energy_timeseries";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("postgres error: {0}")]
    Postgres(#[from] postgres::Error),
    #[error("stored row {id} has out-of-range timestamp {timestamp}")]
    BadRow { id: i64, timestamp: i64 },
}

/// A store that hands out short-lived connections.
pub trait Store {
    /// Human-readable location with credentials removed.
    fn describe(&self) -> String;

    fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError>;

    /// Connect-and-close probe used by the readiness gate.
    fn probe(&self) -> Result<(), StoreError> {
        self.connect().map(drop)
    }
}

/// One open connection. Dropping it closes the connection.
pub trait StoreConnection {
    /// Create the table and its unique constraint if absent.
    fn ensure_schema(&mut self) -> Result<(), StoreError>;

    /// Insert `record`, or overwrite `value`/`filter_label` of the row with the same key.
    fn upsert(&mut self, record: &TimeSeriesRecord) -> Result<(), StoreError>;

    /// Every row ordered by `timestamp`, then `id`.
    fn load_all(&mut self) -> Result<Vec<StoredRow>, StoreError>;
}

/// A batch that stopped part-way. Rows before the failure stay committed.
#[derive(Debug, Error)]
#[error("batch stopped after {written} row(s): {source}")]
pub struct BatchError {
    pub written: usize,
    #[source]
    pub source: StoreError,
}

/// Upsert `records` one statement at a time.
///
/// There is no enclosing transaction: each statement commits on its own, so a
/// failure keeps the rows already written.
pub fn write_batch(conn: &mut dyn StoreConnection, records: &[TimeSeriesRecord]) -> Result<usize, BatchError> {
    let mut written = 0;
    for record in records {
        conn.upsert(record)
            .map_err(|source| BatchError { written, source })?;
        written += 1;
    }
    Ok(written)
}

/// Open the backend named by `url`.
pub fn open_store(url: &str) -> Box<dyn Store> {
    let trimmed = url.trim();
    if trimmed.starts_with("postgres://") || trimmed.starts_with("postgresql://") {
        Box::new(pg::PostgresStore::new(trimmed))
    } else {
        let path = trimmed.strip_prefix("sqlite://").unwrap_or(trimmed);
        Box::new(sqlite::SqliteStore::new(path))
    }
}

/// Build a `StoredRow`, rejecting timestamps chrono cannot represent.
pub(crate) fn stored_row(id: i64, record: TimeSeriesRecord) -> Result<StoredRow, StoreError> {
    let timestamp = record.timestamp;
    StoredRow::new(id, record).ok_or(StoreError::BadRow { id, timestamp })
}
