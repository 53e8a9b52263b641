pub mod config;
pub mod logging;

pub mod catalog;
pub mod checkpoint;
pub mod control;
pub mod error;
pub mod http;
pub mod merge;
pub mod monitor;
pub mod pipeline;
pub mod scheduler;
pub mod source;
pub mod status;
pub mod window;
pub mod worker;
