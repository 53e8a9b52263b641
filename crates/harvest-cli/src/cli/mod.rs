//! CLI for the harvest ingestion engine.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use harvest_core::config;

use commands::{run_completions, run_ohlcv, run_status, run_twits};

/// Top-level CLI for harvest.
#[derive(Debug, Parser)]
#[command(name = "harvest")]
#[command(about = "harvest: parallel, resumable candle and message ingestion", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Harvest hourly price candles for every catalog asset.
    Ohlcv {
        /// Window start (inclusive), e.g. 2021-01-01 or 2021-01-01T00:00:00.
        start: String,
        /// Window end (exclusive).
        end: String,
    },

    /// Harvest social stream messages for every catalog asset.
    Twits {
        /// Window start (inclusive).
        start: String,
        /// Window end (exclusive).
        end: String,
    },

    /// List the per-asset checkpoints currently on disk.
    Status {
        #[arg(value_enum)]
        subsystem: Subsystem,
    },

    /// Print a shell completion script to stdout.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Ingestion subsystem; names the checkpoint directory and merged dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Subsystem {
    Ohlcv,
    Twits,
}

impl Subsystem {
    pub fn name(self) -> &'static str {
        match self {
            Subsystem::Ohlcv => "ohlcv",
            Subsystem::Twits => "twits",
        }
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        if let CliCommand::Completions { shell } = cli.command {
            return run_completions(shell);
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Ohlcv { start, end } => run_ohlcv(&cfg, &start, &end).await?,
            CliCommand::Twits { start, end } => run_twits(&cfg, &start, &end).await?,
            CliCommand::Status { subsystem } => run_status(&cfg, subsystem)?,
            CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
