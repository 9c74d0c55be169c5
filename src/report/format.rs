//! Terminal formatting for run summaries and row tables.

use crate::app::pipeline::RunSummary;
use crate::domain::StoredRow;
use crate::report::ValueStats;

pub fn format_run_summary(summary: &RunSummary) -> String {
    format!(
        "Run summary: combinations={} (skipped={}) | timestamps={} (empty={}, failed={}) | records written={} dropped={}",
        summary.combinations,
        summary.combinations_skipped,
        summary.timestamps_attempted,
        summary.timestamps_empty,
        summary.timestamps_failed,
        summary.records_written,
        summary.records_dropped,
    )
}

/// Render up to `limit` rows as a fixed-width table (most recent last).
///
/// When more rows match than `limit`, the oldest are elided and a footer says so.
pub fn format_rows_table(rows: &[&StoredRow], limit: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>8}  {:<16}  {:<28}  {:>9}  {:<6}  {:<12}  {:>14}\n",
        "id", "datetime (UTC)", "filter_label", "filter_id", "region", "resolution", "value"
    ));
    out.push_str(&format!("{}\n", "-".repeat(8 + 16 + 28 + 9 + 6 + 12 + 14 + 12)));

    let skip = rows.len().saturating_sub(limit);
    for row in &rows[skip..] {
        let r = &row.record;
        out.push_str(&format!(
            "{:>8}  {:<16}  {:<28}  {:>9}  {:<6}  {:<12}  {:>14}\n",
            row.id,
            row.datetime.format("%Y-%m-%d %H:%M"),
            truncate(&r.filter_label, 28),
            r.filter_id,
            truncate(&r.region, 6),
            truncate(&r.resolution, 12),
            fmt_value(r.value),
        ));
    }

    if skip > 0 {
        out.push_str(&format!("({skip} earlier row(s) not shown)\n"));
    }
    out
}

pub fn format_value_stats(stats: &ValueStats) -> String {
    format!(
        "Rows: {} ({} with values) | min={:.2} max={:.2} mean={:.2}",
        stats.n_rows, stats.n_values, stats.min, stats.max, stats.mean
    )
}

fn fmt_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.3}"),
        _ => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TimeSeriesRecord;

    fn row(id: i64, timestamp: i64, value: Option<f64>) -> StoredRow {
        StoredRow::new(
            id,
            TimeSeriesRecord {
                filter_label: "Stromverbrauch: Gesamt (Netzlast)".to_string(),
                filter_id: 410,
                region: "DE".to_string(),
                resolution: "hour".to_string(),
                timestamp,
                value,
            },
        )
        .unwrap()
    }

    #[test]
    fn summary_lists_every_counter() {
        let summary = RunSummary {
            combinations: 4,
            combinations_skipped: 1,
            timestamps_attempted: 3,
            timestamps_empty: 1,
            timestamps_failed: 1,
            records_written: 336,
            records_dropped: 2,
        };
        assert_eq!(
            format_run_summary(&summary),
            "Run summary: combinations=4 (skipped=1) | timestamps=3 (empty=1, failed=1) | records written=336 dropped=2"
        );
    }

    #[test]
    fn table_shows_latest_rows_and_gaps() {
        let rows = [row(1, 0, Some(1.0)), row(2, 3_600_000, None), row(3, 7_200_000, Some(2.5))];
        let refs: Vec<&StoredRow> = rows.iter().collect();
        let table = format_rows_table(&refs, 2);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[2].contains("1970-01-01 01:00"));
        assert!(lines[2].trim_end().ends_with('-'));
        assert!(lines[3].trim_end().ends_with("2.500"));
        assert!(lines[3].contains("Stromverbrauch: Gesamt (Net…"));
        assert_eq!(lines[4], "(1 earlier row(s) not shown)");
    }
}
