//! `harvest status` – list per-asset checkpoints of one subsystem.

use anyhow::Result;
use harvest_core::checkpoint::CheckpointStore;
use harvest_core::config::HarvestConfig;
use harvest_core::monitor::format_ts;
use harvest_core::pipeline::checkpoint_overview;
use harvest_core::source::{Candle, Message};

use crate::cli::Subsystem;

pub fn run_status(cfg: &HarvestConfig, subsystem: Subsystem) -> Result<()> {
    let store = CheckpointStore::new(cfg.checkpoint_dir(subsystem.name()));
    let infos = match subsystem {
        Subsystem::Ohlcv => checkpoint_overview::<Candle>(&store)?,
        Subsystem::Twits => checkpoint_overview::<Message>(&store)?,
    };
    if infos.is_empty() {
        println!("No checkpoints in {}.", store.dir().display());
        return Ok(());
    }
    println!("{:<12} {:>10}  {:<20} {}", "ASSET", "RECORDS", "FROM", "TO");
    for info in &infos {
        println!(
            "{:<12} {:>10}  {:<20} {}",
            info.asset,
            info.records,
            format_ts(info.first),
            format_ts(info.last)
        );
    }
    let total: usize = infos.iter().map(|i| i.records).sum();
    println!("{} assets, {} records", infos.len(), total);
    Ok(())
}
