//! Bounded worker pool: one blocking worker per asset, at most `max_workers` at once.
//!
//! A driver task keeps the `JoinSet` filled from the task queue; when a worker
//! returns, the next queued asset starts. A panicking worker is reported as
//! `error` for its asset and never affects its siblings.

use anyhow::Result;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};

use crate::checkpoint::CheckpointStore;
use crate::control::StopFlag;
use crate::error::HarvestError;
use crate::source::PageSource;
use crate::status::{Phase, StatusEvent, StatusSender};
use crate::window::AssetTask;
use crate::worker;

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    max_workers: usize,
}

impl WorkerPool {
    /// Pool with exactly `max_workers` slots. Zero slots is fatal: nothing could ever run.
    pub fn new(max_workers: usize) -> Result<Self, HarvestError> {
        if max_workers == 0 {
            return Err(HarvestError::NoWorkers("max_workers is 0".to_string()));
        }
        Ok(Self { max_workers })
    }

    /// Pool sized from config; None means one slot per available processing unit.
    pub fn from_config(max_workers: Option<usize>) -> Result<Self, HarvestError> {
        match max_workers {
            Some(n) => Self::new(n),
            None => {
                let n = std::thread::available_parallelism()
                    .map(NonZeroUsize::get)
                    .map_err(|e| HarvestError::NoWorkers(format!("available parallelism: {e}")))?;
                Self::new(n)
            }
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Start harvesting `tasks`. Must be called from within a tokio runtime.
    pub fn submit<S: PageSource>(
        &self,
        source: Arc<S>,
        store: CheckpointStore,
        tasks: Vec<AssetTask>,
        status: StatusSender,
        stop: StopFlag,
    ) -> PoolHandle {
        let max_workers = self.max_workers;
        let total = tasks.len();
        tracing::info!(source = source.name(), assets = total, max_workers, "pool started");
        let driver = tokio::spawn(drive(source, store, tasks, status, stop, max_workers));
        PoolHandle { driver, total }
    }
}

/// Terminal phase of every task the pool ran.
#[derive(Debug, Clone, Default)]
pub struct PoolReport {
    pub outcomes: BTreeMap<String, Phase>,
}

impl PoolReport {
    pub fn count(&self, phase: Phase) -> usize {
        self.outcomes.values().filter(|p| **p == phase).count()
    }
}

/// Handle to a submitted batch. Resolves once every task is terminal.
pub struct PoolHandle {
    driver: JoinHandle<PoolReport>,
    total: usize,
}

impl PoolHandle {
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_finished(&self) -> bool {
        self.driver.is_finished()
    }

    /// Reclaim the driver and return its report. If the batch is still running the
    /// driver is aborted; workers already inside a page request finish that request.
    pub async fn terminate(self) -> Result<PoolReport> {
        if !self.driver.is_finished() {
            tracing::warn!("terminating pool with tasks still running");
            self.driver.abort();
        }
        match self.driver.await {
            Ok(report) => Ok(report),
            Err(e) if e.is_cancelled() => Ok(PoolReport::default()),
            Err(e) => Err(anyhow::anyhow!("pool driver join: {}", e)),
        }
    }
}

async fn drive<S: PageSource>(
    source: Arc<S>,
    store: CheckpointStore,
    tasks: Vec<AssetTask>,
    status: StatusSender,
    stop: StopFlag,
    max_workers: usize,
) -> PoolReport {
    let mut queue = tasks.into_iter();
    let mut join_set = JoinSet::new();
    let mut report = PoolReport::default();

    loop {
        while join_set.len() < max_workers {
            let Some(task) = queue.next() else {
                break;
            };
            let source = Arc::clone(&source);
            let store = store.clone();
            let status = status.clone();
            let stop = stop.clone();
            join_set.spawn_blocking(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    worker::harvest_asset(source.as_ref(), &store, &task, &status, &stop)
                }));
                let phase = outcome.unwrap_or_else(|_| {
                    tracing::error!(asset = %task.asset, "worker panicked");
                    status.send(StatusEvent::bare(&task.asset, Phase::Error, 0));
                    Phase::Error
                });
                (task.asset, phase)
            });
        }

        if join_set.is_empty() {
            break;
        }

        let Some(res) = join_set.join_next().await else {
            break;
        };
        match res {
            Ok((asset, phase)) => {
                report.outcomes.insert(asset, phase);
            }
            Err(e) => tracing::error!("worker task join: {}", e),
        }
    }

    tracing::info!(
        done = report.count(Phase::Done),
        saved = report.count(Phase::Saved),
        skipped = report.count(Phase::Skipped),
        error = report.count(Phase::Error),
        "pool finished"
    );
    report
}
