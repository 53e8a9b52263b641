//! Kline (candle) source.
//!
//! Requests `{base_url}?symbol=&interval=&limit=&startTime=` and receives an
//! array of fixed-shape kline arrays. The cursor is the open time (ms) of the
//! next candle wanted; pagination ends once it reaches the window end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::{Page, PageSource, Record};
use crate::config::CandleSourceConfig;
use crate::error::FetchError;
use crate::http::HttpClient;
use crate::window::Window;

const COL_OPEN_TIME: usize = 0;
const COL_CLOSE: usize = 4;
const COL_VOLUME: usize = 5;
const COL_TRADES: usize = 8;

/// One candle as persisted in the per-asset checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time of the candle.
    pub date: DateTime<Utc>,
    /// Close price.
    pub price: f64,
    pub volume: f64,
    pub trade_count: u64,
}

/// Merged-dataset row: `{date, price, volume, trade_count, asset}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleRow {
    pub date: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
    pub trade_count: u64,
    pub asset: String,
}

impl Record for Candle {
    type Key = i64;
    type Tagged = CandleRow;

    fn key(&self) -> i64 {
        self.date.timestamp_millis()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.date
    }

    fn tagged(self, asset: &str) -> CandleRow {
        CandleRow {
            date: self.date,
            price: self.price,
            volume: self.volume,
            trade_count: self.trade_count,
            asset: asset.to_string(),
        }
    }
}

pub struct CandleSource {
    client: HttpClient,
    cfg: CandleSourceConfig,
}

impl CandleSource {
    pub fn new(client: HttpClient, cfg: CandleSourceConfig) -> Self {
        Self { client, cfg }
    }

    fn page_url(&self, asset: &str, start_ms: i64) -> Result<Url, FetchError> {
        let symbol = format!("{}{}", asset, self.cfg.quote_asset);
        let limit = self.cfg.limit.to_string();
        let start = start_ms.to_string();
        Ok(Url::parse_with_params(
            &self.cfg.base_url,
            &[
                ("symbol", symbol.as_str()),
                ("interval", self.cfg.interval.as_str()),
                ("limit", limit.as_str()),
                ("startTime", start.as_str()),
            ],
        )?)
    }
}

impl PageSource for CandleSource {
    type Record = Candle;
    /// Open time in milliseconds of the next candle to request.
    type Cursor = i64;

    fn name(&self) -> &'static str {
        "ohlcv"
    }

    fn start_cursor(&self, window: &Window, last: Option<&Candle>) -> i64 {
        match last {
            Some(c) => c.date.timestamp_millis() + 1,
            None => window.start().timestamp_millis(),
        }
    }

    fn exhausted(&self, cursor: &i64, _last: Option<&Candle>, window: &Window) -> bool {
        *cursor >= window.end().timestamp_millis()
    }

    fn fetch_page(&self, asset: &str, cursor: &i64) -> Result<Page<Candle, i64>, FetchError> {
        let url = self.page_url(asset, *cursor)?;
        let rows: Vec<Vec<Value>> = self.client.get_json(&url)?;
        let records = parse_klines(&rows)?;
        let next = records.last().map(|c| c.date.timestamp_millis() + 1);
        Ok(Page { records, next })
    }
}

/// Convert raw kline arrays into candles, keeping open time, close, volume and trade count.
pub(crate) fn parse_klines(rows: &[Vec<Value>]) -> Result<Vec<Candle>, FetchError> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| -> Result<Candle, FetchError> {
            let open_ms = as_i64(row.get(COL_OPEN_TIME))
                .ok_or_else(|| FetchError::Parse(format!("kline {i}: missing open time")))?;
            let date = DateTime::from_timestamp_millis(open_ms)
                .ok_or_else(|| FetchError::Parse(format!("kline {i}: bad open time {open_ms}")))?;
            let price = as_f64(row.get(COL_CLOSE))
                .ok_or_else(|| FetchError::Parse(format!("kline {i}: missing close")))?;
            let volume = as_f64(row.get(COL_VOLUME))
                .ok_or_else(|| FetchError::Parse(format!("kline {i}: missing volume")))?;
            let trade_count = as_i64(row.get(COL_TRADES))
                .and_then(|n| u64::try_from(n).ok())
                .ok_or_else(|| FetchError::Parse(format!("kline {i}: missing trade count")))?;
            Ok(Candle {
                date,
                price,
                volume,
                trade_count,
            })
        })
        .collect()
}

// Klines mix JSON numbers and decimal strings; accept either.
fn as_f64(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_i64(v: Option<&Value>) -> Option<i64> {
    match v? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
