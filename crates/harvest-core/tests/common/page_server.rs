//! Minimal HTTP/1.1 server that serves paginated kline and message-stream pages.
//!
//! Klines: `GET /klines?symbol={ASSET}USDT&limit=&startTime=` returns hourly
//! candles starting at `BASE_MS`, `hours` per asset. Messages:
//! `GET /streams/{ASSET}.X.json[?max=]` returns ids `count..=1`, newest first,
//! three per page, where message `id` was created `id` hours after `BASE_MS`.
//! `max` is inclusive, so consecutive pages overlap by one message.
//! Asset `FAIL` always gets a 500.

use serde_json::json;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use url::Url;

/// 2021-01-01T00:00:00Z
pub const BASE_MS: i64 = 1_609_459_200_000;
pub const HOUR_MS: i64 = 3_600_000;
const MESSAGES_PER_PAGE: u64 = 3;

pub struct PageServer {
    pub base_url: String,
    requests: Arc<AtomicUsize>,
}

impl PageServer {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Start the server in a background thread. `data` maps asset id to the number of
/// hourly candles (and messages) it has. Runs until the process exits.
pub fn start(data: &[(&str, u64)]) -> PageServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let data: Arc<HashMap<String, u64>> =
        Arc::new(data.iter().map(|(a, n)| (a.to_string(), *n)).collect());
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let data = Arc::clone(&data);
            let counter = Arc::clone(&counter);
            thread::spawn(move || handle(stream, &data, &counter));
        }
    });
    PageServer {
        base_url: format!("http://127.0.0.1:{}/", port),
        requests,
    }
}

fn handle(mut stream: std::net::TcpStream, data: &HashMap<String, u64>, counter: &AtomicUsize) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let target = request
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/");
    counter.fetch_add(1, Ordering::SeqCst);

    let (status, body) = match Url::parse(&format!("http://localhost{}", target)) {
        Ok(url) => route(&url, data),
        Err(_) => ("400 Bad Request", String::new()),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(body.as_bytes());
}

fn route(url: &Url, data: &HashMap<String, u64>) -> (&'static str, String) {
    let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
    let path = url.path();
    if path == "/klines" {
        let symbol = query.get("symbol").map(String::as_str).unwrap_or("");
        let asset = symbol.strip_suffix("USDT").unwrap_or(symbol);
        return klines(asset, &query, data);
    }
    if let Some(rest) = path.strip_prefix("/streams/") {
        let asset = rest.strip_suffix(".X.json").unwrap_or(rest);
        return messages(asset, &query, data);
    }
    ("404 Not Found", String::new())
}

fn klines(
    asset: &str,
    query: &HashMap<String, String>,
    data: &HashMap<String, u64>,
) -> (&'static str, String) {
    if asset == "FAIL" {
        return ("500 Internal Server Error", String::new());
    }
    let hours = data.get(asset).copied().unwrap_or(0) as i64;
    let limit: i64 = query.get("limit").and_then(|l| l.parse().ok()).unwrap_or(500);
    let start: i64 = query
        .get("startTime")
        .and_then(|s| s.parse().ok())
        .unwrap_or(BASE_MS);
    // First candle whose open time is >= startTime.
    let first = ((start - BASE_MS).max(0) + HOUR_MS - 1) / HOUR_MS;
    let rows: Vec<serde_json::Value> = (first..hours)
        .take(limit as usize)
        .map(|h| {
            let open = BASE_MS + h * HOUR_MS;
            json!([
                open, "1.0", "2.0", "0.5", format!("{}.5", h), "10.25",
                open + HOUR_MS - 1, "100.0", h * 2, "5.0", "50.0", "0"
            ])
        })
        .collect();
    ("200 OK", serde_json::Value::Array(rows).to_string())
}

fn messages(
    asset: &str,
    query: &HashMap<String, String>,
    data: &HashMap<String, u64>,
) -> (&'static str, String) {
    if asset == "FAIL" {
        return ("500 Internal Server Error", String::new());
    }
    let count = data.get(asset).copied().unwrap_or(0);
    let max = query
        .get("max")
        .and_then(|m| m.parse::<u64>().ok())
        .unwrap_or(count)
        .min(count);
    let ids: Vec<u64> = (1..=max).rev().take(MESSAGES_PER_PAGE as usize).collect();
    let msgs: Vec<serde_json::Value> = ids
        .iter()
        .map(|&id| {
            let created = chrono::DateTime::from_timestamp_millis(BASE_MS + id as i64 * HOUR_MS)
                .unwrap()
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
            json!({
                "id": id,
                "body": format!("${} message, number {}", asset, id),
                "created_at": created,
                "user": {"id": id * 10, "username": format!("user{}", id)}
            })
        })
        .collect();
    let cursor = json!({"more": ids.last().is_some_and(|&l| l > 1), "since": ids.first(), "max": ids.last()});
    ("200 OK", json!({"cursor": cursor, "messages": msgs}).to_string())
}
