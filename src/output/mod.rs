//! Output formatting module
//!
//! Renders run reports and partition plans in the supported formats.

mod formatter;

pub(crate) use formatter::results_csv;
pub use formatter::{write_results_to_file, OutputFormat, ResultFormatter};
