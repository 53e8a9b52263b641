//! Worker status events and their aggregation.
//!
//! Workers push `StatusEvent`s into an unbounded channel; the supervisor is the
//! single consumer and folds them into `AggregatedState`. Events from different
//! workers interleave arbitrarily and may arrive late, so the fold keeps the
//! most advanced event per asset instead of the most recent one.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::mpsc;

/// Lifecycle phase of one asset's worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Running,
    Saving,
    Saved,
    Skipped,
    Error,
    Done,
}

impl Phase {
    /// Advancement order used when folding events.
    pub fn rank(self) -> u8 {
        match self {
            Phase::Running => 0,
            Phase::Saving => 1,
            Phase::Saved => 2,
            Phase::Skipped => 3,
            Phase::Error => 4,
            Phase::Done => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Running => "running",
            Phase::Saving => "saving",
            Phase::Saved => "saved",
            Phase::Skipped => "skipped",
            Phase::Error => "error",
            Phase::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress report from a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub asset: String,
    /// Records accumulated for the asset so far (checkpoint plus this run).
    pub records: usize,
    pub phase: Phase,
    /// Pages fetched in this run.
    pub iteration: u64,
    /// Oldest and newest record timestamps; None while nothing is accumulated.
    pub min_ts: Option<DateTime<Utc>>,
    pub max_ts: Option<DateTime<Utc>>,
}

impl StatusEvent {
    /// Event with no records and no timestamps (skipped, early error).
    pub fn bare(asset: &str, phase: Phase, iteration: u64) -> Self {
        Self {
            asset: asset.to_string(),
            records: 0,
            phase,
            iteration,
            min_ts: None,
            max_ts: None,
        }
    }

    fn advancement(&self) -> (u8, usize, u64) {
        (self.phase.rank(), self.records, self.iteration)
    }
}

/// Producer side of the status channel. Cloned into every worker.
#[derive(Debug, Clone)]
pub struct StatusSender {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl StatusSender {
    /// Send without blocking. Events are dropped silently once the supervisor is gone.
    pub fn send(&self, event: StatusEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("status receiver closed; event dropped");
        }
    }
}

pub fn status_channel() -> (StatusSender, mpsc::UnboundedReceiver<StatusEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StatusSender { tx }, rx)
}

/// Latest known state per asset, at most one entry each.
#[derive(Debug, Clone, Default)]
pub struct AggregatedState {
    by_asset: BTreeMap<String, StatusEvent>,
}

/// Per-phase counts over the aggregated state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseCounts {
    pub running: usize,
    pub saving: usize,
    pub saved: usize,
    pub skipped: usize,
    pub error: usize,
    pub done: usize,
}

impl AggregatedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event. The stored event is replaced only if the new one is at
    /// least as advanced (phase rank, then record count). Returns true if it was.
    pub fn apply(&mut self, event: StatusEvent) -> bool {
        match self.by_asset.get_mut(&event.asset) {
            Some(current) if event.advancement() < current.advancement() => false,
            Some(current) => {
                *current = event;
                true
            }
            None => {
                self.by_asset.insert(event.asset.clone(), event);
                true
            }
        }
    }

    pub fn get(&self, asset: &str) -> Option<&StatusEvent> {
        self.by_asset.get(asset)
    }

    pub fn len(&self) -> usize {
        self.by_asset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_asset.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &StatusEvent> {
        self.by_asset.values()
    }

    pub fn total_records(&self) -> usize {
        self.by_asset.values().map(|e| e.records).sum()
    }

    pub fn counts(&self) -> PhaseCounts {
        let mut c = PhaseCounts::default();
        for e in self.by_asset.values() {
            match e.phase {
                Phase::Running => c.running += 1,
                Phase::Saving => c.saving += 1,
                Phase::Saved => c.saved += 1,
                Phase::Skipped => c.skipped += 1,
                Phase::Error => c.error += 1,
                Phase::Done => c.done += 1,
            }
        }
        c
    }
}
