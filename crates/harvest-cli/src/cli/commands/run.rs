//! `harvest ohlcv` / `harvest twits` – harvest the catalog over a window, then merge.

use anyhow::Result;
use harvest_core::config::HarvestConfig;
use harvest_core::monitor::{self, Summary};
use harvest_core::pipeline::{self, HarvestOutcome};
use harvest_core::source::PageSource;
use harvest_core::window::Window;
use std::io::Write;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub async fn run_ohlcv(cfg: &HarvestConfig, start: &str, end: &str) -> Result<()> {
    let window = Window::parse(start, end)?;
    run_subsystem(pipeline::candle_source(cfg), cfg, window, "OHLCV INGESTION").await
}

pub async fn run_twits(cfg: &HarvestConfig, start: &str, end: &str) -> Result<()> {
    let window = Window::parse(start, end)?;
    run_subsystem(pipeline::message_source(cfg), cfg, window, "STOCKTWITS INGESTION").await
}

async fn run_subsystem<S: PageSource>(
    source: S,
    cfg: &HarvestConfig,
    window: Window,
    title: &str,
) -> Result<()> {
    let name = source.name();
    let outcome =
        pipeline::run_harvest(source, cfg, window, title, interrupt(), print_summary).await?;
    print_outcome(&outcome, cfg, name);
    Ok(())
}

/// Resolves on the first Ctrl-C. If the handler cannot be installed, never resolves.
async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for interrupt: {}", e);
        std::future::pending::<()>().await;
    }
}

fn print_summary(summary: &Summary) {
    let mut out = std::io::stdout().lock();
    let _ = write!(out, "{}{}", CLEAR_SCREEN, monitor::render(summary));
    let _ = out.flush();
}

fn print_outcome(outcome: &HarvestOutcome, cfg: &HarvestConfig, name: &str) {
    println!(
        "Merged {} records from {} assets into {}",
        outcome.merged.records,
        outcome.merged.assets,
        cfg.merged_path(name).display()
    );
    if outcome.interrupted {
        println!("Interrupted: progress saved. Run the same command again to resume.");
    }
    tracing::info!(
        source = name,
        records = outcome.merged.records,
        interrupted = outcome.interrupted,
        "harvest finished"
    );
}
