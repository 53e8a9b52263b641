//! End-to-end harvest: catalog → pool → supervisor → merge.
//!
//! Fatal errors (missing catalog, no worker slots) surface here before any
//! worker is spawned. Everything after that is per-asset and reported through
//! the summary instead.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog;
use crate::checkpoint::CheckpointStore;
use crate::config::HarvestConfig;
use crate::control::StopFlag;
use crate::http::HttpClient;
use crate::merge::{self, MergeStats};
use crate::monitor::{Summary, Supervisor, SupervisorOptions};
use crate::scheduler::{PoolReport, WorkerPool};
use crate::source::{CandleSource, MessageSource, PageSource, Record};
use crate::status::status_channel;
use crate::window::{self, Window};

/// Result of one complete run.
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    pub summary: Summary,
    pub report: PoolReport,
    pub merged: MergeStats,
    /// True when the run was cut short by an interrupt.
    pub interrupted: bool,
}

pub fn candle_source(cfg: &HarvestConfig) -> CandleSource {
    CandleSource::new(HttpClient::new(&cfg.http), cfg.candles.clone())
}

pub fn message_source(cfg: &HarvestConfig) -> MessageSource {
    MessageSource::new(HttpClient::new(&cfg.http), cfg.messages.clone())
}

/// Harvest every catalog asset over `window` with `source`, then merge the
/// per-asset checkpoints into the subsystem's dataset.
///
/// `interrupt` resolving requests a graceful stop; `on_update` receives every
/// refreshed summary while the pool runs.
pub async fn run_harvest<S, I, F>(
    source: S,
    cfg: &HarvestConfig,
    window: Window,
    title: &str,
    interrupt: I,
    on_update: F,
) -> Result<HarvestOutcome>
where
    S: PageSource,
    I: Future<Output = ()>,
    F: FnMut(&Summary),
{
    let name = source.name();
    let assets = catalog::load_assets(&cfg.catalog_path, &cfg.catalog_column)?;
    let pool = WorkerPool::from_config(cfg.max_workers)?;
    let store = CheckpointStore::new(cfg.checkpoint_dir(name));
    tracing::info!(
        source = name,
        %window,
        assets = assets.len(),
        workers = pool.max_workers(),
        "harvest starting"
    );

    let (status_tx, mut status_rx) = status_channel();
    let stop = StopFlag::new();
    let handle = pool.submit(
        Arc::new(source),
        store.clone(),
        window::tasks_for(&assets, window),
        status_tx,
        stop.clone(),
    );

    let mut supervisor = Supervisor::new(
        SupervisorOptions {
            title: title.to_string(),
            poll_interval: Duration::from_millis(cfg.poll_interval_ms.max(1)),
            extra_rows: cfg.summary_extra_rows,
        },
        assets.len(),
        pool.max_workers(),
    );
    let summary = supervisor
        .run(&handle, &mut status_rx, &stop, interrupt, on_update)
        .await;
    let report = handle.terminate().await?;

    // Every checkpoint on disk, including assets that have left the catalog.
    let out = cfg.merged_path(name);
    let merged = merge::merge_checkpoints::<S::Record>(&store, None, &out)
        .with_context(|| format!("merge {} checkpoints into {}", name, out.display()))?;

    Ok(HarvestOutcome {
        summary,
        report,
        merged,
        interrupted: stop.is_set(),
    })
}

/// One checkpoint as listed by `harvest status`.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointInfo {
    pub asset: String,
    pub records: usize,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
}

/// Describe every checkpoint currently on disk for one subsystem.
pub fn checkpoint_overview<R: Record>(store: &CheckpointStore) -> Result<Vec<CheckpointInfo>> {
    let mut out = Vec::new();
    for asset in store.assets()? {
        let Some(cp) = store.read::<R>(&asset)? else {
            continue;
        };
        let first = cp.records.iter().map(Record::timestamp).min();
        let last = cp.records.iter().map(Record::timestamp).max();
        out.push(CheckpointInfo {
            records: cp.len(),
            asset,
            first,
            last,
        });
    }
    Ok(out)
}
