//! ASCII bar plot of stored values over time.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Each column is a time bucket; its bar is the mean of the non-null values
//! falling into it. Buckets without values stay blank.
//!
//! Bars grow from zero by magnitude, scaled to the largest absolute mean.
//! Negative means are drawn with `-` instead of `#`.

use crate::domain::StoredRow;

pub fn render_bar_plot(rows: &[&StoredRow], width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let points: Vec<(i64, f64)> = rows
        .iter()
        .filter_map(|r| r.record.value.filter(|v| v.is_finite()).map(|v| (r.record.timestamp, v)))
        .collect();

    let (Some(t_min), Some(t_max)) = (
        points.iter().map(|(t, _)| *t).min(),
        points.iter().map(|(t, _)| *t).max(),
    ) else {
        return "Plot: no values to draw\n".to_string();
    };

    // Mean per column.
    let mut sums = vec![0.0_f64; width];
    let mut counts = vec![0usize; width];
    for &(t, v) in &points {
        let x = map_x(t, t_min, t_max, width);
        sums[x] += v;
        counts[x] += 1;
    }
    let means: Vec<Option<f64>> = sums
        .iter()
        .zip(&counts)
        .map(|(&s, &n)| (n > 0).then(|| s / n as f64))
        .collect();

    let (lo, hi) = value_range(&means);
    let scale = lo.abs().max(hi.abs());
    let scale = if scale < 1e-12 { 1.0 } else { scale };

    let bars: Vec<(usize, char)> = means
        .iter()
        .map(|m| match m {
            Some(v) => {
                let h = ((v.abs() / scale) * height as f64).round() as usize;
                (h.min(height), if *v < 0.0 { '-' } else { '#' })
            }
            None => (0, ' '),
        })
        .collect();

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: {} .. {} UTC | value=[{lo:.2}, {hi:.2}] | full bar=|{scale:.2}|\n",
        fmt_ts(t_min),
        fmt_ts(t_max)
    ));
    for level in (1..=height).rev() {
        let line: String = bars
            .iter()
            .map(|&(h, glyph)| if h >= level { glyph } else { ' ' })
            .collect();
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn map_x(t: i64, t_min: i64, t_max: i64, width: usize) -> usize {
    if t_max == t_min {
        return 0;
    }
    let u = (t - t_min) as f64 / (t_max - t_min) as f64;
    ((u * (width as f64 - 1.0)).round() as usize).min(width - 1)
}

fn value_range(means: &[Option<f64>]) -> (f64, f64) {
    let lo = means.iter().flatten().copied().fold(f64::INFINITY, f64::min);
    let hi = means.iter().flatten().copied().fold(f64::NEG_INFINITY, f64::max);
    (lo, hi)
}

fn fmt_ts(ms: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}
