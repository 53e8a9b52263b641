//! CLI command handlers, one file per command.

mod completions;
mod run;
mod status;

pub use completions::run_completions;
pub use run::{run_ohlcv, run_twits};
pub use status::run_status;
