//! Logging init: file under XDG state dir, or graceful fallback to stderr.
//!
//! Stdout belongs to the live progress summary, so log lines never go there.
//!
//! Every worker runs inside an `asset{asset=..}` span. With hundreds of assets
//! per run the per-page debug lines are only useful for one of them, so the
//! default filter stays at `info` and `HARVEST_LOG_ASSET=BTC` turns on debug
//! output inside that asset's span alone. `RUST_LOG` replaces the base filter.

use anyhow::Result;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,harvest_core=info,harvest=info";
/// Asset whose worker span is logged at debug level.
pub const FOCUS_ENV: &str = "HARVEST_LOG_ASSET";

/// Writer that is either the log file or stderr (used when the file clone fails).
enum LogSink {
    File(fs::File),
    Stderr,
}

impl io::Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogSink::File(f) => f.write(buf),
            LogSink::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogSink::File(f) => f.flush(),
            LogSink::Stderr => io::stderr().lock().flush(),
        }
    }
}

struct SharedLogFile(fs::File);

impl<'a> MakeWriter<'a> for SharedLogFile {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(LogSink::File)
            .unwrap_or(LogSink::Stderr)
    }
}

/// Filter directives: `base` (or the default) plus a debug directive scoped to
/// the worker span of `focus`, when one is named.
pub fn filter_directives(base: Option<&str>, focus: Option<&str>) -> String {
    let base = base
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .unwrap_or(DEFAULT_FILTER);
    match focus.map(str::trim).filter(|f| !f.is_empty()) {
        Some(asset) => format!("{base},harvest_core[asset{{asset={asset}}}]=debug"),
        None => base.to_string(),
    }
}

fn env_filter() -> EnvFilter {
    let base = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let focus = std::env::var(FOCUS_ENV).ok();
    let directives = filter_directives(base.as_deref(), focus.as_deref());
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize structured logging to `~/.local/state/harvest/harvest.log` and
/// return the log path. On failure (e.g. log dir unwritable) returns Err so the
/// caller can fall back to stderr.
pub fn init_logging() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("harvest")?;
    let log_dir = xdg_dirs.get_state_home();
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("harvest.log");

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(BoxMakeWriter::new(SharedLogFile(file)))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install subscriber: {}", e))?;

    tracing::info!(path = %log_path.display(), "logging initialized");
    Ok(log_path)
}

/// Initialize logging to stderr only. Used when `init_logging` fails so the CLI still runs.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}
