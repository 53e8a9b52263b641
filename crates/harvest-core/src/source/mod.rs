//! Paginated remote sources.
//!
//! A `PageSource` knows how to turn a cursor into one page of records for an
//! asset, where to resume from a checkpoint, and when the window is exhausted.
//! The worker loop is identical for every source; only these hooks differ.

mod candles;
mod messages;

pub use candles::{Candle, CandleRow, CandleSource};
pub use messages::{Message, MessageRow, MessageSource};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::hash::Hash;

use crate::error::FetchError;
use crate::window::Window;

/// One harvested row as stored in a checkpoint file.
pub trait Record: Clone + fmt::Debug + Send + Serialize + DeserializeOwned + 'static {
    /// Natural key used to drop duplicates at page boundaries.
    type Key: Eq + Hash + Clone + Send;
    /// Row shape in the merged dataset (the record plus its asset id).
    type Tagged: Serialize;

    fn key(&self) -> Self::Key;
    fn timestamp(&self) -> DateTime<Utc>;
    fn tagged(self, asset: &str) -> Self::Tagged;
}

/// Records returned by one request and the cursor for the following one.
#[derive(Debug, Clone)]
pub struct Page<R, C> {
    pub records: Vec<R>,
    /// None when the source gave no way to continue.
    pub next: Option<C>,
}

impl<R, C> Page<R, C> {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub trait PageSource: Send + Sync + 'static {
    type Record: Record;
    type Cursor: Clone + fmt::Debug + Send;

    /// Subsystem name; checkpoint directory and merged dataset are named after it.
    fn name(&self) -> &'static str;

    /// Cursor for the first request of a run. `last` is the last record of the
    /// loaded checkpoint in fetch order, if any.
    fn start_cursor(&self, window: &Window, last: Option<&Self::Record>) -> Self::Cursor;

    /// True when no further request can yield in-window records. `last` is the
    /// most recently fetched record (in fetch order) across checkpoint and run.
    fn exhausted(&self, cursor: &Self::Cursor, last: Option<&Self::Record>, window: &Window) -> bool;

    /// Issue one blocking request for `asset` at `cursor`.
    fn fetch_page(
        &self,
        asset: &str,
        cursor: &Self::Cursor,
    ) -> Result<Page<Self::Record, Self::Cursor>, FetchError>;
}
