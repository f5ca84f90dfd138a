//! Parallel suite execution
//!
//! Wires the pipeline together: partition, launch, multiplex, aggregate.

use anyhow::Result;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::models::{OverallResult, TestSuite};
use crate::utils::{Stopwatch, Timer};

use super::aggregator::Aggregator;
use super::launcher::{Launch, ProcessLauncher};
use super::multiplexer::{LineSink, Multiplexer};
use super::partition::Partitioner;
use super::SplitError;

/// Runs a suite split across a fixed number of worker processes
pub struct ParallelExecutor {
    config: AppConfig,
}

impl ParallelExecutor {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Run `suite`, streaming worker output into `sink`.
    ///
    /// Per-group failures end up in the returned result; only configuration
    /// problems and the overall deadline are errors.
    pub async fn run<S: LineSink>(&self, suite: &TestSuite, sink: S) -> Result<OverallResult> {
        self.config.validate_for_run()?;

        let started_at = Utc::now();
        let partitioner = Partitioner::new(self.config.workers)?;

        if suite.is_empty() {
            info!("Suite is empty, nothing to run");
            return Ok(OverallResult::new(started_at, Vec::new()));
        }
        let partitions = partitioner.split_non_empty(suite);

        info!(
            "Running {} tests in {} group(s) (workers: {})",
            suite.len(),
            partitions.len(),
            partitioner.workers()
        );

        let run_timer = Timer::start("run");
        let mut phases = Stopwatch::new();
        let run_dir = prepare_run_dir(self.config.transcript_dir().as_deref(), started_at)?;
        info!("Transcripts: {}", run_dir.display());

        let mux = Multiplexer::start(sink);
        let launcher = ProcessLauncher::new(
            self.config.runner.clone(),
            &run_dir,
            partitions.len(),
        );

        let mut handles = Vec::new();
        let mut not_started = Vec::new();
        for partition in partitions {
            match launcher.launch(partition, &mux).await {
                Launch::Started(handle) => handles.push(handle),
                Launch::Failed(result) => not_started.push(result),
            }
        }
        phases.lap("launch");

        let aggregator = Aggregator::new(self.config.overall_timeout())
            .with_worker_timeout(self.config.worker_timeout())
            .with_drain_grace(self.config.drain_grace())
            .with_failure_markers(self.config.failure_markers.clone());
        let collected = aggregator.collect(handles, not_started).await;
        phases.lap("wait");

        match mux.finish().await {
            Ok(lines) => debug!("Console sink wrote {} lines", lines),
            Err(e) => warn!("Console output failed: {}; transcripts are complete", e),
        }

        let results = collected?;
        debug!("Phases: {}", phases.format());
        run_timer.stop();

        Ok(OverallResult::new(started_at, results).with_transcript_dir(run_dir))
    }
}

/// Create the directory holding transcripts and scratch dirs for one run.
///
/// Under an explicit base directory each run gets a timestamped child;
/// otherwise a fresh temp directory is created and kept after exit.
fn prepare_run_dir(
    base: Option<&Path>,
    started_at: chrono::DateTime<Utc>,
) -> Result<PathBuf, SplitError> {
    match base {
        Some(base) => {
            let dir = base.join(format!("run-{}", started_at.format("%Y%m%d-%H%M%S-%3f")));
            std::fs::create_dir_all(&dir).map_err(|source| SplitError::RunDirectory {
                path: dir.clone(),
                source,
            })?;
            Ok(dir)
        }
        None => tempfile::Builder::new()
            .prefix("suite-splitter-")
            .tempdir()
            .map(|dir| dir.keep())
            .map_err(|source| SplitError::RunDirectory {
                path: std::env::temp_dir(),
                source,
            }),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::RunnerConfig;
    use crate::models::{OutputLine, RunStatus, StreamKind, FAILURE_EXIT_CODE};
    use std::io;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct MemorySink {
        lines: Arc<Mutex<Vec<OutputLine>>>,
    }

    impl LineSink for MemorySink {
        fn write_line(&mut self, line: &OutputLine) -> io::Result<()> {
            self.lines.lock().unwrap().push(line.clone());
            Ok(())
        }
    }

    /// Runner that prints each test id it receives and fails if any id
    /// starts with `fail`
    fn script_config(dir: &Path, workers: usize) -> AppConfig {
        let script = r#"for t in "$@"; do echo "run $t"; done
for t in "$@"; do case "$t" in fail*) exit 1;; esac; done
exit 0"#;
        AppConfig {
            workers,
            runner: RunnerConfig::new("sh").arg("-c").arg(script).arg("sh"),
            transcript_dir: Some(dir.to_string_lossy().into_owned()),
            overall_timeout_secs: 60,
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_three_tests_two_workers_pass() {
        let dir = tempdir().unwrap();
        let sink = MemorySink::default();
        let suite = TestSuite::new(["t1", "t2", "t3"]);

        let overall = ParallelExecutor::new(script_config(dir.path(), 2))
            .run(&suite, sink.clone())
            .await
            .unwrap();

        assert!(overall.is_success());
        assert_eq!(overall.exit_code(), 0);
        assert_eq!(overall.passed, 2);
        assert_eq!(overall.results[0].tests, ["t1", "t2"]);
        assert_eq!(overall.results[1].tests, ["t3"]);

        let lines = sink.lines.lock().unwrap();
        let group_one: Vec<&str> = lines
            .iter()
            .filter(|l| l.partition == 0 && l.stream == StreamKind::Stdout)
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(group_one, ["run t1", "run t2"]);
    }

    #[tokio::test]
    async fn test_failing_group_does_not_affect_other() {
        let dir = tempdir().unwrap();
        let suite = TestSuite::new(["t1", "fail2"]);

        let overall = ParallelExecutor::new(script_config(dir.path(), 2))
            .run(&suite, MemorySink::default())
            .await
            .unwrap();

        assert_eq!(overall.exit_code(), FAILURE_EXIT_CODE);
        assert_eq!(overall.results[0].status, RunStatus::Passed);
        assert_eq!(overall.results[1].status, RunStatus::Failed);
        assert_eq!(overall.results[1].exit_code, Some(1));

        let transcript = overall.results[1].transcript.as_ref().unwrap();
        assert_eq!(std::fs::read_to_string(transcript).unwrap(), "run fail2\n");
    }

    #[tokio::test]
    async fn test_empty_suite_launches_nothing() {
        let dir = tempdir().unwrap();
        let suite = TestSuite::new(Vec::<String>::new());

        let overall = ParallelExecutor::new(script_config(dir.path(), 2))
            .run(&suite, MemorySink::default())
            .await
            .unwrap();

        assert!(overall.is_success());
        assert!(overall.results.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_excess_workers_are_not_launched() {
        let dir = tempdir().unwrap();
        let suite = TestSuite::new(["t1", "t2"]);

        let overall = ParallelExecutor::new(script_config(dir.path(), 5))
            .run(&suite, MemorySink::default())
            .await
            .unwrap();

        assert_eq!(overall.groups, 2);
        assert!(overall.results.iter().all(|r| r.pid.is_some()));
    }

    #[tokio::test]
    async fn test_launch_failure_is_isolated() {
        let dir = tempdir().unwrap();
        let mut config = script_config(dir.path(), 2);
        config.runner = RunnerConfig::new("/nonexistent/suite-splitter-runner");
        let suite = TestSuite::new(["t1", "t2"]);

        let overall = ParallelExecutor::new(config)
            .run(&suite, MemorySink::default())
            .await
            .unwrap();

        assert!(!overall.is_success());
        assert_eq!(overall.failed, 2);
        assert!(overall
            .results
            .iter()
            .all(|r| r.status == RunStatus::LaunchError && r.exit_code.is_none()));
    }

    #[tokio::test]
    async fn test_overall_deadline_bounds_run_with_open_pipe() {
        let dir = tempdir().unwrap();
        let config = AppConfig {
            workers: 1,
            runner: RunnerConfig::new("sh").arg("-c").arg("sleep 25 & echo hi").arg("sh"),
            transcript_dir: Some(dir.path().to_string_lossy().into_owned()),
            overall_timeout_secs: 1,
            drain_grace_secs: 60,
            ..AppConfig::default()
        };
        let suite = TestSuite::new(["t1"]);

        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(8),
            ParallelExecutor::new(config).run(&suite, MemorySink::default()),
        )
        .await
        .expect("run must end shortly after the overall timeout");

        match outcome {
            Ok(overall) => assert!(!overall.is_success()),
            Err(e) => assert!(matches!(
                e.downcast_ref::<SplitError>(),
                Some(SplitError::DeadlineExceeded { .. })
            )),
        }
    }

    #[tokio::test]
    async fn test_missing_runner_is_an_error() {
        let config = AppConfig::default();
        let suite = TestSuite::new(["t1"]);
        let outcome = ParallelExecutor::new(config)
            .run(&suite, MemorySink::default())
            .await;
        assert!(outcome.is_err());
    }
}
