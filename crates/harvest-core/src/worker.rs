//! Per-asset fetch worker.
//!
//! Runs on a blocking thread and walks one asset's pages from its resume point
//! until the source is exhausted, the stop flag is raised, or a request fails:
//!
//! - stop flag set before the first request of the run: `skipped`, nothing written
//! - stop flag set after at least one page: `saving`, flush, `saved`
//! - request or parse failure: `error`, flush what was accumulated
//! - exhaustion: trim to the window, flush, `done`
//!
//! The checkpoint is read once and written at most once per run. Only the
//! `done` write trims to `[start, end)`. Interrupted and failed runs persist the
//! accumulator as fetched, since its last record is the resume cursor.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::checkpoint::CheckpointStore;
use crate::control::StopFlag;
use crate::source::{PageSource, Record};
use crate::status::{Phase, StatusEvent, StatusSender};
use crate::window::AssetTask;

/// Harvest one asset and return its terminal phase. Never panics on I/O or
/// network failure; those end in `Phase::Error`.
pub fn harvest_asset<S: PageSource>(
    source: &S,
    store: &CheckpointStore,
    task: &AssetTask,
    status: &StatusSender,
    stop: &StopFlag,
) -> Phase {
    let asset = task.asset.as_str();
    let window = &task.window;
    let _span = tracing::info_span!("asset", asset).entered();

    if stop.is_set() {
        tracing::debug!(asset, "stop requested before start; skipping");
        status.send(StatusEvent::bare(asset, Phase::Skipped, 0));
        return Phase::Skipped;
    }

    let mut acc = match store.load::<S::Record>(asset) {
        Ok(cp) => cp.map(|c| c.records).unwrap_or_default(),
        Err(e) => {
            tracing::error!(asset, error = %format!("{e:#}"), "cannot read checkpoint");
            status.send(StatusEvent::bare(asset, Phase::Error, 0));
            return Phase::Error;
        }
    };
    let mut seen: HashSet<<S::Record as Record>::Key> = acc.iter().map(Record::key).collect();
    let mut cursor = source.start_cursor(window, acc.last());
    let mut iteration = 0u64;
    tracing::debug!(asset, resumed = acc.len(), ?cursor, "worker started");

    loop {
        if source.exhausted(&cursor, acc.last(), window) {
            break;
        }

        if stop.is_set() {
            if iteration == 0 {
                tracing::debug!(asset, "stop requested before first page; skipping");
                status.send(StatusEvent::bare(asset, Phase::Skipped, 0));
                return Phase::Skipped;
            }
            status.send(event(asset, &acc, Phase::Saving, iteration));
            return match store.flush(asset, &acc) {
                Ok(()) => {
                    tracing::info!(asset, records = acc.len(), iteration, "interrupted; progress saved");
                    status.send(event(asset, &acc, Phase::Saved, iteration));
                    Phase::Saved
                }
                Err(e) => {
                    tracing::error!(asset, error = %format!("{e:#}"), "flush on interrupt failed");
                    status.send(event(asset, &acc, Phase::Error, iteration));
                    Phase::Error
                }
            };
        }

        let page = match source.fetch_page(asset, &cursor) {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(asset, iteration, error = %e, "page request failed");
                if !acc.is_empty() {
                    if let Err(e) = store.flush(asset, &acc) {
                        tracing::error!(asset, error = %format!("{e:#}"), "flush after failure failed");
                    }
                }
                status.send(event(asset, &acc, Phase::Error, iteration));
                return Phase::Error;
            }
        };

        if page.is_empty() {
            break;
        }

        let before = acc.len();
        for record in page.records {
            if seen.insert(record.key()) {
                acc.push(record);
            }
        }
        let added = acc.len() - before;
        if added == 0 {
            tracing::debug!(asset, ?cursor, "page carried no new records; stopping");
            break;
        }

        iteration += 1;
        tracing::debug!(asset, iteration, added, records = acc.len(), "page fetched");
        status.send(event(asset, &acc, Phase::Running, iteration));

        match page.next {
            Some(next) => cursor = next,
            None => break,
        }
    }

    acc.retain(|r| window.contains(r.timestamp()));
    match store.flush(asset, &acc) {
        Ok(()) => {
            tracing::info!(asset, records = acc.len(), iteration, "asset done");
            status.send(event(asset, &acc, Phase::Done, iteration));
            Phase::Done
        }
        Err(e) => {
            tracing::error!(asset, error = %format!("{e:#}"), "final flush failed");
            status.send(event(asset, &acc, Phase::Error, iteration));
            Phase::Error
        }
    }
}

fn event<R: Record>(asset: &str, acc: &[R], phase: Phase, iteration: u64) -> StatusEvent {
    let (min_ts, max_ts) = bounds(acc);
    StatusEvent {
        asset: asset.to_string(),
        records: acc.len(),
        phase,
        iteration,
        min_ts,
        max_ts,
    }
}

fn bounds<R: Record>(acc: &[R]) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let mut it = acc.iter().map(Record::timestamp);
    let Some(first) = it.next() else {
        return (None, None);
    };
    let (lo, hi) = it.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
    (Some(lo), Some(hi))
}
