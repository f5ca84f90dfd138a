//! Output line model
//!
//! Lines captured from worker processes on their way to the console sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which child stream a line came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn name(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single complete line produced by a worker
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    /// Zero-based partition index of the producing worker
    pub partition: usize,
    pub stream: StreamKind,
    pub timestamp: DateTime<Utc>,
    /// Line text without its terminator
    pub text: String,
}

impl OutputLine {
    pub fn new(partition: usize, stream: StreamKind, text: impl Into<String>) -> Self {
        Self {
            partition,
            stream,
            timestamp: Utc::now(),
            text: text.into(),
        }
    }

    /// Build a line from raw bytes, dropping a trailing `\n` or `\r\n`
    pub fn from_bytes(partition: usize, stream: StreamKind, raw: &[u8]) -> Self {
        let mut end = raw.len();
        if end > 0 && raw[end - 1] == b'\n' {
            end -= 1;
            if end > 0 && raw[end - 1] == b'\r' {
                end -= 1;
            }
        }
        Self::new(partition, stream, String::from_utf8_lossy(&raw[..end]))
    }

    /// Console prefix, e.g. `[g1]` or `[g2:err]`
    pub fn prefix(&self) -> String {
        match self.stream {
            StreamKind::Stdout => format!("[g{}]", self.partition + 1),
            StreamKind::Stderr => format!("[g{}:err]", self.partition + 1),
        }
    }
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.prefix(), self.text)
    }
}
