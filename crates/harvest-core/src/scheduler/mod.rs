//! Asset scheduler.
//!
//! Fans an asset list out over a bounded pool of blocking workers:
//! catalog → tasks → pool (one worker per asset) → per-asset checkpoints.

mod pool;

pub use pool::{PoolHandle, PoolReport, WorkerPool};
