//! Data models for split test runs
//!
//! This module contains all data structures shared by the executor,
//! output and results modules.

mod output;
mod result;
mod suite;

pub use output::{OutputLine, StreamKind};
pub use result::{OverallResult, RunResult, RunStatus, FAILURE_EXIT_CODE};
pub use suite::{Partition, TestSuite};
