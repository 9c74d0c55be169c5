//! Dashboard read view over `energy_timeseries`.

use crate::error::{AppError, EXIT_STORE_READ};
use crate::report::{DashboardFilter, format_rows_table, format_value_stats, value_stats};
use crate::store::{Store, TABLE};

/// Layout knobs for the rendered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowOptions {
    pub limit: usize,
    pub width: usize,
    pub height: usize,
}

/// Load the table once and render the filtered table + bar plot.
pub fn render_dashboard(store: &dyn Store, filter: &DashboardFilter, opts: ShowOptions) -> Result<String, AppError> {
    let mut conn = store
        .connect()
        .map_err(|e| AppError::new(EXIT_STORE_READ, format!("Failed to connect to {}: {e}", store.describe())))?;
    let rows = conn
        .load_all()
        .map_err(|e| AppError::new(EXIT_STORE_READ, format!("Failed to load {TABLE}: {e}")))?;

    if rows.is_empty() {
        return Ok("No data available. Please ensure the ingestion job has inserted data.\n".to_string());
    }

    let selected = filter.apply(&rows);
    if selected.is_empty() {
        return Ok(format!(
            "{} row(s) stored, none match the selected filters.\n",
            rows.len()
        ));
    }

    let mut out = String::new();
    out.push_str(&format!("== {TABLE} ==\n"));
    out.push_str(&format_rows_table(&selected, opts.limit));
    if let Some(stats) = value_stats(&selected) {
        out.push_str(&format_value_stats(&stats));
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&crate::plot::render_bar_plot(&selected, opts.width, opts.height));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TimeSeriesRecord;
    use crate::store::sqlite::SqliteStore;
    use crate::store::write_batch;

    const OPTS: ShowOptions = ShowOptions {
        limit: 10,
        width: 20,
        height: 5,
    };

    fn store_with(records: &[TimeSeriesRecord]) -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("energy.db"));
        let mut conn = store.connect().unwrap();
        conn.ensure_schema().unwrap();
        write_batch(&mut *conn, records).unwrap();
        (dir, store)
    }

    fn record(region: &str, timestamp: i64, value: f64) -> TimeSeriesRecord {
        TimeSeriesRecord {
            filter_label: "load".to_string(),
            filter_id: 410,
            region: region.to_string(),
            resolution: "hour".to_string(),
            timestamp,
            value: Some(value),
        }
    }

    #[test]
    fn empty_table_renders_warning() {
        let (_dir, store) = store_with(&[]);
        let out = render_dashboard(&store, &DashboardFilter::default(), OPTS).unwrap();
        assert!(out.starts_with("No data available"));
    }

    #[test]
    fn filter_with_no_match_is_reported() {
        let (_dir, store) = store_with(&[record("DE", 0, 1.0)]);
        let filter = DashboardFilter {
            region: Some("AT".to_string()),
            ..DashboardFilter::default()
        };
        let out = render_dashboard(&store, &filter, OPTS).unwrap();
        assert_eq!(out, "1 row(s) stored, none match the selected filters.\n");
    }

    #[test]
    fn renders_table_stats_and_plot() {
        let (_dir, store) = store_with(&[record("DE", 0, 1.0), record("DE", 3_600_000, 3.0), record("AT", 0, 9.0)]);
        let filter = DashboardFilter {
            region: Some("DE".to_string()),
            ..DashboardFilter::default()
        };
        let out = render_dashboard(&store, &filter, OPTS).unwrap();
        assert!(out.starts_with("== energy_timeseries ==\n"));
        assert!(out.contains("Rows: 2 (2 with values) | min=1.00 max=3.00 mean=2.00"));
        assert!(out.contains("Plot: 1970-01-01 00:00 .. 1970-01-01 01:00 UTC"));
        assert!(!out.contains("9.000"));
    }

    #[test]
    fn missing_table_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("energy.db"));
        let err = render_dashboard(&store, &DashboardFilter::default(), OPTS).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_STORE_READ);
    }
}
