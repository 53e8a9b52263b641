//! Social message stream source.
//!
//! Requests `{base_url}/{ASSET}{suffix}.json?filter=&max=` and receives
//! `{"cursor": {"max": ..}, "messages": [..]}`, newest first. The cursor is the
//! upper message id bound for the next (older) page; an empty message array
//! ends the stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::{Page, PageSource, Record};
use crate::config::MessageSourceConfig;
use crate::error::FetchError;
use crate::http::HttpClient;
use crate::window::Window;

/// One message as persisted in the per-asset checkpoint. `payload` keeps the
/// raw JSON object so no source field is lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub date: DateTime<Utc>,
    pub payload: String,
}

/// Merged-dataset row: `{id, date, asset, payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: u64,
    pub date: DateTime<Utc>,
    pub asset: String,
    pub payload: String,
}

impl Record for Message {
    type Key = u64;
    type Tagged = MessageRow;

    fn key(&self) -> u64 {
        self.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.date
    }

    fn tagged(self, asset: &str) -> MessageRow {
        MessageRow {
            id: self.id,
            date: self.date,
            asset: asset.to_string(),
            payload: self.payload,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    cursor: Option<StreamCursor>,
    #[serde(default)]
    messages: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct StreamCursor {
    #[serde(default)]
    max: Option<u64>,
}

pub struct MessageSource {
    client: HttpClient,
    cfg: MessageSourceConfig,
}

impl MessageSource {
    pub fn new(client: HttpClient, cfg: MessageSourceConfig) -> Self {
        Self { client, cfg }
    }

    fn page_url(&self, asset: &str, max: Option<u64>) -> Result<Url, FetchError> {
        let base = self.cfg.base_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/{}{}.json", base, asset, self.cfg.symbol_suffix))?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("filter", &self.cfg.filter);
            if let Some(max) = max {
                q.append_pair("max", &max.to_string());
            }
        }
        Ok(url)
    }
}

impl PageSource for MessageSource {
    type Record = Message;
    /// Upper id bound for the next page; None requests the newest page.
    type Cursor = Option<u64>;

    fn name(&self) -> &'static str {
        "twits"
    }

    fn start_cursor(&self, _window: &Window, last: Option<&Message>) -> Option<u64> {
        last.map(|m| m.id)
    }

    fn exhausted(&self, _cursor: &Option<u64>, last: Option<&Message>, window: &Window) -> bool {
        // Pages walk backwards in time; once the oldest message predates the
        // window nothing older can be in it.
        last.is_some_and(|m| m.date < window.start())
    }

    fn fetch_page(
        &self,
        asset: &str,
        cursor: &Option<u64>,
    ) -> Result<Page<Message, Option<u64>>, FetchError> {
        let url = self.page_url(asset, *cursor)?;
        let resp: StreamResponse = self.client.get_json(&url)?;
        let records = parse_messages(&resp.messages)?;
        let next = resp
            .cursor
            .and_then(|c| c.max)
            .or_else(|| records.last().map(|m| m.id))
            .map(Some);
        Ok(Page { records, next })
    }
}

pub(crate) fn parse_messages(raw: &[Value]) -> Result<Vec<Message>, FetchError> {
    raw.iter()
        .enumerate()
        .map(|(i, m)| -> Result<Message, FetchError> {
            let id = m
                .get("id")
                .and_then(Value::as_u64)
                .ok_or_else(|| FetchError::Parse(format!("message {i}: missing id")))?;
            let created = m
                .get("created_at")
                .and_then(Value::as_str)
                .ok_or_else(|| FetchError::Parse(format!("message {id}: missing created_at")))?;
            let date = DateTime::parse_from_rfc3339(created)
                .map_err(|e| FetchError::Parse(format!("message {id}: created_at {created:?}: {e}")))?
                .with_timezone(&Utc);
            Ok(Message {
                id,
                date,
                payload: m.to_string(),
            })
        })
        .collect()
}
