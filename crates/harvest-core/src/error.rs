//! Error types shared across the engine.
//!
//! `FetchError` covers a single page request and is always contained inside the
//! asset's worker. `HarvestError` is reserved for the few conditions that stop
//! the process before any worker starts.

use std::path::PathBuf;

/// Failure of one page request: transport, HTTP status, or response shape.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("{0}")]
    Curl(#[from] curl::Error),
    #[error("HTTP {code} from {url}")]
    Http { code: u32, url: String },
    #[error("malformed response: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Parse(e.to_string())
    }
}

/// Process-fatal conditions, surfaced before the pool spawns anything.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("asset catalog not found: {}", .0.display())]
    CatalogMissing(PathBuf),
    #[error("asset catalog {} has no column {column:?}", .path.display())]
    CatalogColumnMissing { path: PathBuf, column: String },
    #[error("no worker can start: {0}")]
    NoWorkers(String),
}
