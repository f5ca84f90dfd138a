//! Worker process launching
//!
//! One child per non-empty partition. Each child runs the configured runner
//! with the partition's test ids appended, inherits the parent environment
//! and gets its own scratch directory.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info};

use crate::config::{RunnerConfig, ENV_PREFIX};
use crate::models::{Partition, RunResult, RunStatus};
use crate::utils::Timer;

use super::multiplexer::{Multiplexer, Transcript};

/// Lifecycle of a started worker.
///
/// A partition whose spawn fails never gets a handle; it goes straight to a
/// `Launch::Failed` result instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Exited(Option<i32>),
    Reaped,
}

/// A started worker process and its output readers
pub struct WorkerHandle {
    pub(super) partition: Partition,
    pub(super) child: Child,
    pub(super) readers: Vec<JoinHandle<io::Result<()>>>,
    pub(super) transcript: PathBuf,
    pub(super) timer: Timer,
    pid: Option<u32>,
    state: WorkerState,
}

impl WorkerHandle {
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn transcript(&self) -> &Path {
        &self.transcript
    }

    /// Abort handles for the output readers, usable after the handle moves
    pub(super) fn reader_aborts(&self) -> Vec<AbortHandle> {
        self.readers.iter().map(|r| r.abort_handle()).collect()
    }

    pub(super) fn mark_exited(&mut self, code: Option<i32>) {
        debug_assert_eq!(self.state, WorkerState::Running);
        self.state = WorkerState::Exited(code);
    }

    pub(super) fn mark_reaped(&mut self) {
        debug_assert!(matches!(self.state, WorkerState::Exited(_)));
        self.state = WorkerState::Reaped;
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Readers left behind here are stuck on a pipe some grandchild holds.
        for reader in &self.readers {
            reader.abort();
        }
    }
}

/// Outcome of a launch attempt
pub enum Launch {
    Started(WorkerHandle),
    Failed(RunResult),
}

/// Spawns worker processes for partitions
pub struct ProcessLauncher {
    runner: RunnerConfig,
    run_dir: PathBuf,
    group_count: usize,
}

impl ProcessLauncher {
    pub fn new(runner: RunnerConfig, run_dir: impl Into<PathBuf>, group_count: usize) -> Self {
        Self {
            runner,
            run_dir: run_dir.into(),
            group_count,
        }
    }

    pub fn transcript_path(&self, partition: &Partition) -> PathBuf {
        self.run_dir.join(format!("{}.log", partition.label()))
    }

    pub fn scratch_dir(&self, partition: &Partition) -> PathBuf {
        self.run_dir.join(format!("{}-tmp", partition.label()))
    }

    /// Build the command line and environment for one partition
    pub fn command(&self, partition: &Partition, scratch: &Path) -> Command {
        let mut cmd = Command::new(&self.runner.program);
        cmd.args(&self.runner.args)
            .args(&partition.tests)
            .envs(&self.runner.env)
            .env("TMPDIR", scratch)
            .env("TMP", scratch)
            .env("TEMP", scratch)
            .env(format!("{ENV_PREFIX}_TMPDIR"), scratch)
            .env(format!("{ENV_PREFIX}_GROUP"), (partition.index + 1).to_string())
            .env(format!("{ENV_PREFIX}_GROUP_COUNT"), self.group_count.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.runner.working_dir {
            cmd.current_dir(dir);
        }

        cmd
    }

    /// Start a worker for `partition` and attach its readers to `mux`.
    ///
    /// Never waits for the child. Any failure is confined to this partition.
    pub async fn launch(&self, partition: Partition, mux: &Multiplexer) -> Launch {
        let scratch = self.scratch_dir(&partition);
        if let Err(e) = tokio::fs::create_dir_all(&scratch).await {
            error!("{}: cannot create scratch dir {}: {}", partition, scratch.display(), e);
            return Launch::Failed(RunResult::not_started(
                partition.index,
                partition.tests,
                RunStatus::LaunchError,
                format!("scratch dir {}: {e}", scratch.display()),
            ));
        }

        let transcript_path = self.transcript_path(&partition);
        let transcript = match Transcript::create(&transcript_path).await {
            Ok(t) => t,
            Err(e) => {
                error!("{}: cannot create transcript {}: {}", partition, transcript_path.display(), e);
                return Launch::Failed(RunResult::not_started(
                    partition.index,
                    partition.tests,
                    RunStatus::TranscriptError,
                    format!("transcript {}: {e}", transcript_path.display()),
                ));
            }
        };

        let mut cmd = self.command(&partition, &scratch);
        let timer = Timer::start(partition.label());
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!("{}: failed to spawn {}: {}", partition, self.runner.program, e);
                return Launch::Failed(
                    RunResult::launch_error(
                        partition.index,
                        partition.tests,
                        format!("spawn {}: {e}", self.runner.program),
                    )
                    .with_transcript(transcript_path),
                );
            }
        };

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            // Unreachable with piped stdio; the child is killed on drop.
            return Launch::Failed(RunResult::not_started(
                partition.index,
                partition.tests,
                RunStatus::LaunchError,
                "child stdio was not captured",
            ));
        };

        let pid = child.id();
        info!(
            "Launched {} (pid {}) -> {}",
            partition,
            pid.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string()),
            transcript_path.display()
        );
        debug!("{} tests: {:?}", partition.label(), partition.tests);

        let readers = mux.attach(partition.index, stdout, stderr, transcript);

        Launch::Started(WorkerHandle {
            partition,
            child,
            readers,
            transcript: transcript_path,
            timer,
            pid,
            state: WorkerState::Running,
        })
    }
}
