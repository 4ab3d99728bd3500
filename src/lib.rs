pub mod auth;
pub mod config;
pub mod db;
pub mod enricher;
pub mod error;
pub mod fetcher;
pub mod gear;
pub mod geocode;
pub mod location;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod replay;
pub mod splits;
pub mod strava;
pub mod units;
pub mod writer;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use error::{PipelineError, RecordIssue, Result};
pub use pipeline::{run_replay, run_sync, RunContext, SyncReport};
