//! Test execution engine
//!
//! Splits a suite into partitions, runs each partition in its own child
//! process, multiplexes their output and aggregates the outcomes.

mod aggregator;
mod launcher;
mod multiplexer;
mod parallel;
mod partition;

pub use multiplexer::ConsoleSink;
pub use parallel::ParallelExecutor;
pub use partition::Partitioner;

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a whole run. Per-group failures are reported through
/// `RunStatus` instead.
#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Worker count must be at least 1, got {0}")]
    InvalidWorkerCount(usize),

    #[error("No runner program configured (set runner.program, --runner or SUITE_SPLITTER_RUNNER)")]
    MissingRunner,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No tests given and no discovery source configured")]
    NoDiscoverySource,

    #[error("Test discovery failed: {0}")]
    Discovery(String),

    #[error("Failed to prepare run directory {path}: {source}")]
    RunDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Run exceeded the overall timeout of {secs}s with {pending} group(s) unfinished")]
    DeadlineExceeded { secs: u64, pending: usize },
}
