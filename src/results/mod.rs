//! Run history
//!
//! Saved run summaries and their export.

mod storage;

pub use storage::{ExportFormat, ResultsStorage};
