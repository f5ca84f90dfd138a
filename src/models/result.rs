//! Run result models
//!
//! Per-partition outcomes and the overall verdict derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Process exit code reported when any partition failed
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Terminal status of one partition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Exited 0 with a complete transcript
    Passed,
    /// Exited non-zero or was killed by a signal
    Failed,
    /// The child process could not be started
    LaunchError,
    /// Killed after exceeding the per-worker timeout
    Timeout,
    /// Output could not be read or persisted
    TranscriptError,
    /// Exited 0 but the transcript contains a configured failure marker
    MarkerFound,
}

impl RunStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            RunStatus::Passed => "✓",
            RunStatus::Failed => "✗",
            RunStatus::LaunchError => "!",
            RunStatus::Timeout => "⏱",
            RunStatus::TranscriptError => "?",
            RunStatus::MarkerFound => "✗",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Passed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Passed => write!(f, "PASS"),
            RunStatus::Failed => write!(f, "FAIL"),
            RunStatus::LaunchError => write!(f, "LAUNCH ERROR"),
            RunStatus::Timeout => write!(f, "TIMEOUT"),
            RunStatus::TranscriptError => write!(f, "TRANSCRIPT ERROR"),
            RunStatus::MarkerFound => write!(f, "MARKER"),
        }
    }
}

/// Outcome of one partition's worker
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunResult {
    /// Zero-based partition index
    pub partition: usize,
    pub tests: Vec<String>,
    pub status: RunStatus,
    /// `None` when the worker never started or was killed by a signal
    pub exit_code: Option<i32>,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub transcript: Option<PathBuf>,
    pub message: Option<String>,
}

impl RunResult {
    /// Result for a worker that ran to completion
    pub fn exited(
        partition: usize,
        tests: Vec<String>,
        exit_code: Option<i32>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        let status = if exit_code == Some(0) {
            RunStatus::Passed
        } else {
            RunStatus::Failed
        };

        Self {
            partition,
            tests,
            status,
            exit_code,
            pid: None,
            started_at,
            duration_ms,
            transcript: None,
            message: None,
        }
    }

    /// Result for a partition whose process could not be spawned
    pub fn launch_error(partition: usize, tests: Vec<String>, error: impl Into<String>) -> Self {
        Self::not_started(partition, tests, RunStatus::LaunchError, error)
    }

    /// Result for a partition that never got a running process
    pub fn not_started(
        partition: usize,
        tests: Vec<String>,
        status: RunStatus,
        error: impl Into<String>,
    ) -> Self {
        Self {
            partition,
            tests,
            status,
            exit_code: None,
            pid: None,
            started_at: Utc::now(),
            duration_ms: 0,
            transcript: None,
            message: Some(error.into()),
        }
    }

    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_transcript(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcript = Some(path.into());
        self
    }

    /// Downgrade a passing result. An existing failure status is kept and
    /// only picks up the message when it has none yet.
    pub fn with_status(mut self, status: RunStatus, message: impl Into<String>) -> Self {
        if self.status.is_success() {
            self.status = status;
            self.message = Some(message.into());
        } else if self.message.is_none() {
            self.message = Some(message.into());
        }
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// One-based group number used in reports
    pub fn group(&self) -> usize {
        self.partition + 1
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} group {} ({} tests) {} [{}ms]",
            self.status.symbol(),
            self.group(),
            self.tests.len(),
            self.status,
            self.duration_ms
        )?;
        if let Some(msg) = &self.message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

/// Aggregate over all partitions of one invocation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OverallResult {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub total_tests: usize,
    pub groups: usize,
    pub passed: usize,
    pub failed: usize,
    /// Longest partition duration, since partitions run concurrently
    pub wall_clock_ms: u64,
    pub transcript_dir: Option<PathBuf>,
    pub results: Vec<RunResult>,
}

impl OverallResult {
    pub fn new(started_at: DateTime<Utc>, mut results: Vec<RunResult>) -> Self {
        results.sort_by_key(|r| r.partition);

        let total_tests = results.iter().map(|r| r.tests.len()).sum();
        let passed = results.iter().filter(|r| r.is_success()).count();
        let failed = results.len() - passed;
        let wall_clock_ms = results.iter().map(|r| r.duration_ms).max().unwrap_or(0);

        Self {
            run_id: started_at.format("%Y%m%d-%H%M%S-%3f").to_string(),
            started_at,
            total_tests,
            groups: results.len(),
            passed,
            failed,
            wall_clock_ms,
            transcript_dir: None,
            results,
        }
    }

    pub fn with_transcript_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.transcript_dir = Some(dir.into());
        self
    }

    /// True when every partition passed; vacuously true for an empty suite
    pub fn is_success(&self) -> bool {
        self.results.iter().all(RunResult::is_success)
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            FAILURE_EXIT_CODE
        }
    }
}

impl fmt::Display for OverallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {} started {}", self.run_id, self.started_at)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for result in &self.results {
            writeln!(f, "  {result}")?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Groups: {} | Pass: {} | Fail: {} | Tests: {}",
            self.groups, self.passed, self.failed, self.total_tests
        )?;
        writeln!(f, "Wall clock: {}ms", self.wall_clock_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exit_code_maps_to_status() {
        let ok = RunResult::exited(0, ids(&["t1"]), Some(0), Utc::now(), 10);
        let bad = RunResult::exited(1, ids(&["t2"]), Some(3), Utc::now(), 10);
        let signaled = RunResult::exited(2, ids(&["t3"]), None, Utc::now(), 10);

        assert_eq!(ok.status, RunStatus::Passed);
        assert_eq!(bad.status, RunStatus::Failed);
        assert_eq!(signaled.status, RunStatus::Failed);
    }

    #[test]
    fn test_with_status_keeps_first_failure() {
        let result = RunResult::exited(0, ids(&["t1"]), Some(0), Utc::now(), 10)
            .with_status(RunStatus::TranscriptError, "disk full")
            .with_status(RunStatus::MarkerFound, "panic");

        assert_eq!(result.status, RunStatus::TranscriptError);
        assert_eq!(result.message.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_overall_all_pass() {
        let results = vec![
            RunResult::exited(1, ids(&["t3"]), Some(0), Utc::now(), 250),
            RunResult::exited(0, ids(&["t1", "t2"]), Some(0), Utc::now(), 400),
        ];

        let overall = OverallResult::new(Utc::now(), results);
        assert!(overall.is_success());
        assert_eq!(overall.exit_code(), 0);
        assert_eq!(overall.passed, 2);
        assert_eq!(overall.total_tests, 3);
        assert_eq!(overall.wall_clock_ms, 400);
        assert_eq!(overall.results[0].partition, 0);
    }

    #[test]
    fn test_overall_launch_error_fails_run() {
        let results = vec![
            RunResult::exited(0, ids(&["t1"]), Some(0), Utc::now(), 100),
            RunResult::launch_error(1, ids(&["t2"]), "No such file or directory"),
        ];

        let overall = OverallResult::new(Utc::now(), results);
        assert!(!overall.is_success());
        assert_eq!(overall.exit_code(), FAILURE_EXIT_CODE);
        assert_eq!(overall.failed, 1);
        assert!(overall.results[0].is_success());
    }

    #[test]
    fn test_overall_empty_is_success() {
        let overall = OverallResult::new(Utc::now(), Vec::new());
        assert!(overall.is_success());
        assert_eq!(overall.exit_code(), 0);
        assert_eq!(overall.wall_clock_ms, 0);
    }
}
