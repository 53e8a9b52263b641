//! Progress summary: a pure snapshot of the aggregated state and its text rendering.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::time::Duration;

use crate::status::{AggregatedState, Phase};

/// Global totals plus a bounded, ranked sample of per-asset rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub title: String,
    pub total_assets: usize,
    pub total_records: usize,
    pub elapsed: Duration,
    pub done: usize,
    pub skipped: usize,
    pub error: usize,
    /// Assets not yet done, skipped or failed (including ones never reported).
    pub remaining: usize,
    pub rows: Vec<SummaryRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub asset: String,
    pub phase: Phase,
    pub records: usize,
    pub iteration: u64,
    pub min_ts: Option<DateTime<Utc>>,
    pub max_ts: Option<DateTime<Utc>>,
}

impl Summary {
    /// Build a snapshot. `max_rows` bounds the per-asset sample; skipped assets
    /// are counted but never listed.
    pub fn from_state(
        title: &str,
        state: &AggregatedState,
        total_assets: usize,
        elapsed: Duration,
        max_rows: usize,
    ) -> Self {
        let counts = state.counts();
        let terminal = counts.done + counts.skipped + counts.error;

        let mut rows: Vec<SummaryRow> = state
            .events()
            .filter(|e| e.phase != Phase::Skipped)
            .map(|e| SummaryRow {
                asset: e.asset.clone(),
                phase: e.phase,
                records: e.records,
                iteration: e.iteration,
                min_ts: e.min_ts,
                max_ts: e.max_ts,
            })
            .collect();
        // Most advanced first, then largest, then by name for a stable display.
        rows.sort_by(|a, b| {
            b.phase
                .rank()
                .cmp(&a.phase.rank())
                .then(b.records.cmp(&a.records))
                .then(a.asset.cmp(&b.asset))
        });
        rows.truncate(max_rows);

        Self {
            title: title.to_string(),
            total_assets,
            total_records: state.total_records(),
            elapsed,
            done: counts.done,
            skipped: counts.skipped,
            error: counts.error,
            remaining: total_assets.saturating_sub(terminal),
            rows,
        }
    }
}

/// Render a summary as plain text (no terminal control sequences).
pub fn render(summary: &Summary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", summary.title);
    out.push('\n');
    let _ = writeln!(
        out,
        "records {}  elapsed {}  done {}  skipped {}  error {}  remaining {}  (of {})",
        summary.total_records,
        format_elapsed(summary.elapsed),
        summary.done,
        summary.skipped,
        summary.error,
        summary.remaining,
        summary.total_assets,
    );
    out.push('\n');
    if summary.rows.is_empty() {
        return out;
    }
    let _ = writeln!(
        out,
        "{:<12} {:<8} {:>10} {:>6}  {:<20} {:<20}",
        "asset", "status", "records", "pages", "from", "to"
    );
    for row in &summary.rows {
        let _ = writeln!(
            out,
            "{:<12} {:<8} {:>10} {:>6}  {:<20} {:<20}",
            row.asset,
            row.phase.as_str(),
            row.records,
            row.iteration,
            format_ts(row.min_ts),
            format_ts(row.max_ts),
        );
    }
    out
}

/// `YYYY-MM-DD HH:MM:SS`, or `-` when absent.
pub fn format_ts(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
