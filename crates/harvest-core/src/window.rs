//! Time windows and per-asset tasks.
//!
//! A window is the half-open range `[start, end)` every persisted record must
//! fall in. Bounds are parsed from ISO-8601 strings; values without an offset
//! are taken as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("invalid ISO-8601 date-time: {0:?}")]
    InvalidInstant(String),
    #[error("window start {start} is not before end {end}")]
    Empty {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        if start >= end {
            return Err(WindowError::Empty { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse both bounds from command-line strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, WindowError> {
        Self::new(parse_instant(start)?, parse_instant(end)?)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// One unit of work for the pool: harvest `asset` over `window`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTask {
    pub asset: String,
    pub window: Window,
}

impl AssetTask {
    pub fn new(asset: impl Into<String>, window: Window) -> Self {
        Self {
            asset: asset.into(),
            window,
        }
    }
}

/// Build one task per catalog asset, all sharing the same window.
pub fn tasks_for(assets: &[String], window: Window) -> Vec<AssetTask> {
    assets
        .iter()
        .map(|a| AssetTask::new(a.clone(), window))
        .collect()
}

/// Parse an ISO-8601 date or date-time. Accepts RFC 3339 (with offset),
/// `YYYY-MM-DDTHH:MM:SS[.f]`, the same with a space separator, and `YYYY-MM-DD`.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>, WindowError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(WindowError::InvalidInstant(s.to_string()))
}
