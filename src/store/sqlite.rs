//! SQLite backend (`rusqlite`).

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, params};

use super::{Store, StoreConnection, StoreError, stored_row};
use crate::domain::{StoredRow, TimeSeriesRecord};

const CREATE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS energy_timeseries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filter_label TEXT NOT NULL,
    filter_id INTEGER NOT NULL,
    region TEXT NOT NULL,
    resolution TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    value REAL,
    UNIQUE (filter_id, region, resolution, timestamp)
);";

const UPSERT: &str = "
INSERT INTO energy_timeseries (filter_label, filter_id, region, resolution, timestamp, value)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT (filter_id, region, resolution, timestamp)
DO UPDATE SET value = excluded.value, filter_label = excluded.filter_label";

const SELECT_ALL: &str = "
SELECT id, filter_label, filter_id, region, resolution, timestamp, value
FROM energy_timeseries
ORDER BY timestamp, id";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Store for SqliteStore {
    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(&self.path, flags)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Box::new(SqliteConnection { conn }))
    }
}

pub struct SqliteConnection {
    conn: Connection,
}

impl StoreConnection for SqliteConnection {
    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch(CREATE_TABLE)?;
        Ok(())
    }

    fn upsert(&mut self, record: &TimeSeriesRecord) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare_cached(UPSERT)?;
        stmt.execute(params![
            record.filter_label,
            record.filter_id,
            record.region,
            record.resolution,
            record.timestamp,
            record.value,
        ])?;
        Ok(())
    }

    fn load_all(&mut self) -> Result<Vec<StoredRow>, StoreError> {
        let mut stmt = self.conn.prepare(SELECT_ALL)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    TimeSeriesRecord {
                        filter_label: row.get(1)?,
                        filter_id: row.get(2)?,
                        region: row.get(3)?,
                        resolution: row.get(4)?,
                        timestamp: row.get(5)?,
                        value: row.get(6)?,
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, record)| stored_row(id, record))
            .collect()
    }
}
