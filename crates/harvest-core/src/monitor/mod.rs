//! Supervisor: drains worker status, keeps the aggregated view, re-renders
//! the summary, and turns an external interrupt into the shared stop flag.

mod summary;

pub use summary::{format_ts, render, Summary, SummaryRow};

use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::control::StopFlag;
use crate::scheduler::PoolHandle;
use crate::status::{AggregatedState, StatusEvent};

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Heading shown above the totals.
    pub title: String,
    /// Sleep between channel drains.
    pub poll_interval: Duration,
    /// Summary rows = pool size + this.
    pub extra_rows: usize,
}

pub struct Supervisor {
    opts: SupervisorOptions,
    state: AggregatedState,
    total: usize,
    max_rows: usize,
    started: Instant,
}

impl Supervisor {
    pub fn new(opts: SupervisorOptions, total_assets: usize, workers: usize) -> Self {
        let max_rows = workers + opts.extra_rows;
        Self {
            opts,
            state: AggregatedState::new(),
            total: total_assets,
            max_rows,
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> &AggregatedState {
        &self.state
    }

    pub fn summary(&self) -> Summary {
        Summary::from_state(
            &self.opts.title,
            &self.state,
            self.total,
            self.started.elapsed(),
            self.max_rows,
        )
    }

    /// Poll until `handle` resolves. Every drain that changed the state calls
    /// `on_update` with a fresh summary. When `interrupt` completes the stop flag is
    /// set once and polling continues until the workers have drained.
    pub async fn run<I, F>(
        &mut self,
        handle: &PoolHandle,
        status: &mut UnboundedReceiver<StatusEvent>,
        stop: &StopFlag,
        interrupt: I,
        mut on_update: F,
    ) -> Summary
    where
        I: Future<Output = ()>,
        F: FnMut(&Summary),
    {
        tokio::pin!(interrupt);
        let mut armed = true;
        on_update(&self.summary());

        loop {
            if self.drain(status) {
                on_update(&self.summary());
            }
            if handle.is_finished() {
                break;
            }
            tokio::select! {
                _ = &mut interrupt, if armed => {
                    armed = false;
                    if stop.set() {
                        tracing::info!("interrupt received; workers stop after their current page");
                    }
                }
                _ = tokio::time::sleep(self.opts.poll_interval) => {}
            }
        }

        // Events sent just before the last worker returned.
        self.drain(status);
        let summary = self.summary();
        on_update(&summary);
        summary
    }

    fn drain(&mut self, status: &mut UnboundedReceiver<StatusEvent>) -> bool {
        let mut changed = false;
        while let Ok(event) = status.try_recv() {
            changed |= self.state.apply(event);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointStore;
    use crate::error::FetchError;
    use crate::scheduler::WorkerPool;
    use crate::source::{Candle, Page, PageSource};
    use crate::status::{status_channel, Phase};
    use crate::window::{AssetTask, Window};
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use std::sync::Arc;

    /// Endless hourly candles, slow enough that an interrupt lands mid-run.
    struct Endless;

    impl PageSource for Endless {
        type Record = Candle;
        type Cursor = i64;

        fn name(&self) -> &'static str {
            "ohlcv"
        }

        fn start_cursor(&self, window: &Window, last: Option<&Candle>) -> i64 {
            last.map(|c| c.date.timestamp_millis() + 1)
                .unwrap_or_else(|| window.start().timestamp_millis())
        }

        fn exhausted(&self, cursor: &i64, _last: Option<&Candle>, window: &Window) -> bool {
            *cursor >= window.end().timestamp_millis()
        }

        fn fetch_page(&self, _asset: &str, cursor: &i64) -> Result<Page<Candle, i64>, FetchError> {
            std::thread::sleep(Duration::from_millis(10));
            let date = DateTime::from_timestamp_millis(*cursor).unwrap();
            Ok(Page {
                records: vec![Candle {
                    date,
                    price: 1.0,
                    volume: 1.0,
                    trade_count: 1,
                }],
                next: Some(cursor + 3_600_000),
            })
        }
    }

    fn opts() -> SupervisorOptions {
        SupervisorOptions {
            title: "TEST".into(),
            poll_interval: Duration::from_millis(2),
            extra_rows: 10,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn interrupt_stops_workers_and_keeps_invariant() {
        let dir = tempfile::tempdir().unwrap();
        let start = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let window = Window::new(start, start + ChronoDuration::days(3650)).unwrap();
        let assets = ["A", "B", "C", "D"];
        let tasks: Vec<AssetTask> = assets.iter().map(|a| AssetTask::new(*a, window)).collect();

        let (tx, mut rx) = status_channel();
        let stop = StopFlag::new();
        let pool = WorkerPool::new(2).unwrap();
        let handle = pool.submit(
            Arc::new(Endless),
            CheckpointStore::new(dir.path()),
            tasks,
            tx,
            stop.clone(),
        );

        let mut sup = Supervisor::new(opts(), assets.len(), pool.max_workers());
        let mut renders = 0usize;
        let summary = sup
            .run(
                &handle,
                &mut rx,
                &stop,
                tokio::time::sleep(Duration::from_millis(100)),
                |s| {
                    renders += 1;
                    assert_eq!(s.done + s.skipped + s.error + s.remaining, s.total_assets);
                },
            )
            .await;
        let report = handle.terminate().await.unwrap();

        assert!(stop.is_set());
        assert!(renders >= 2);
        assert_eq!(report.outcomes.len(), 4);
        // The first two were mid-run and saved; the queued two never started.
        assert_eq!(report.count(Phase::Saved), 2);
        assert_eq!(report.count(Phase::Skipped), 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.remaining, 2);
        assert!(summary.total_records > 0);
        for row in &summary.rows {
            assert_eq!(row.phase, Phase::Saved);
        }
    }

    #[tokio::test]
    async fn returns_final_summary_when_pool_done() {
        let dir = tempfile::tempdir().unwrap();
        let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let window = Window::new(start, start + ChronoDuration::hours(3)).unwrap();
        let (tx, mut rx) = status_channel();
        let stop = StopFlag::new();
        let handle = WorkerPool::new(1).unwrap().submit(
            Arc::new(Endless),
            CheckpointStore::new(dir.path()),
            vec![AssetTask::new("A", window)],
            tx,
            stop.clone(),
        );
        let mut sup = Supervisor::new(opts(), 1, 1);
        let summary = sup
            .run(&handle, &mut rx, &stop, std::future::pending(), |_| {})
            .await;
        assert!(!stop.is_set());
        assert_eq!((summary.done, summary.remaining), (1, 0));
        assert_eq!(summary.total_records, 3);
        assert_eq!(sup.state().get("A").unwrap().phase, Phase::Done);
    }
}
