//! Result aggregation
//!
//! Waits for every worker to exit and for its readers to drain, then turns
//! each into a `RunResult`. The whole wait is bounded by the overall
//! timeout.

use futures::future::join_all;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::models::{RunResult, RunStatus};

use super::launcher::WorkerHandle;
use super::SplitError;

/// Collects terminal states from all workers
#[derive(Clone, Debug)]
pub struct Aggregator {
    worker_timeout: Option<Duration>,
    drain_grace: Duration,
    overall_timeout: Duration,
    failure_markers: Vec<String>,
}

impl Aggregator {
    pub fn new(overall_timeout: Duration) -> Self {
        Self {
            worker_timeout: None,
            drain_grace: Duration::from_secs(5),
            overall_timeout,
            failure_markers: Vec::new(),
        }
    }

    pub fn with_worker_timeout(mut self, limit: Option<Duration>) -> Self {
        self.worker_timeout = limit;
        self
    }

    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    pub fn with_failure_markers(mut self, markers: Vec<String>) -> Self {
        self.failure_markers = markers;
        self
    }

    /// Reap every worker and merge with results of partitions that never
    /// started.
    ///
    /// Returns `DeadlineExceeded` if the overall timeout passes first; in
    /// that case all remaining workers are killed.
    pub async fn collect(
        &self,
        handles: Vec<WorkerHandle>,
        not_started: Vec<RunResult>,
    ) -> Result<Vec<RunResult>, SplitError> {
        let deadline = Instant::now() + self.overall_timeout;
        let mut meta = Vec::with_capacity(handles.len());
        let mut tasks = Vec::with_capacity(handles.len());
        // Readers leave their handle during drain, so their aborts are kept here.
        let mut reader_aborts = Vec::new();

        for handle in handles {
            meta.push((handle.partition.index, handle.partition.tests.clone()));
            reader_aborts.extend(handle.reader_aborts());
            let this = self.clone();
            tasks.push(tokio::spawn(async move { this.reap(handle, deadline).await }));
        }

        let aborts: Vec<AbortHandle> = tasks.iter().map(|t| t.abort_handle()).collect();

        let joined = match timeout_at(deadline, join_all(tasks)).await {
            Ok(joined) => joined,
            Err(_) => {
                let pending = aborts.iter().filter(|a| !a.is_finished()).count();
                error!(
                    "Overall timeout of {}s exceeded, killing {} unfinished group(s)",
                    self.overall_timeout.as_secs(),
                    pending
                );
                // Aborting drops each `Child`, which kills it.
                for abort in aborts.iter().chain(&reader_aborts) {
                    abort.abort();
                }
                return Err(SplitError::DeadlineExceeded {
                    secs: self.overall_timeout.as_secs(),
                    pending,
                });
            }
        };

        let mut results = not_started;
        for ((partition, tests), outcome) in meta.into_iter().zip(joined) {
            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    error!("Waiter for group {} failed: {}", partition + 1, e);
                    RunResult::not_started(
                        partition,
                        tests,
                        RunStatus::Failed,
                        format!("waiter task failed: {e}"),
                    )
                }
            };
            results.push(result);
        }

        results.sort_by_key(|r| r.partition);
        Ok(results)
    }

    /// Wait for one worker's exit and drain, producing its result
    async fn reap(&self, mut handle: WorkerHandle, deadline: Instant) -> RunResult {
        let label = handle.partition().label();
        let mut timed_out = false;

        let waited = match self.worker_timeout {
            Some(limit) => match timeout(limit, handle.child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!("{} exceeded {}s, killing", label, limit.as_secs());
                    timed_out = true;
                    if let Err(e) = handle.child.start_kill() {
                        warn!("{}: kill failed: {}", label, e);
                    }
                    handle.child.wait().await
                }
            },
            None => handle.child.wait().await,
        };

        let duration_ms = handle.timer.elapsed_ms();
        let (exit_code, wait_error) = match waited {
            Ok(status) => (status.code(), None),
            Err(e) => (None, Some(e.to_string())),
        };
        handle.mark_exited(exit_code);
        debug!("{} exited with {:?} after {}ms", label, exit_code, duration_ms);

        let drain_error = self.drain(&mut handle, deadline).await;
        handle.mark_reaped();
        debug!("{} {:?}", label, handle.state());

        let mut result = RunResult::exited(
            handle.partition.index,
            handle.partition.tests.clone(),
            exit_code,
            handle.timer.started_at(),
            duration_ms,
        )
        .with_pid(handle.pid())
        .with_transcript(handle.transcript());

        if timed_out {
            result.status = RunStatus::Timeout;
            result.message = Some(format!(
                "killed after {}s",
                self.worker_timeout.map(|d| d.as_secs()).unwrap_or_default()
            ));
        }
        if let Some(e) = wait_error {
            result = result.with_status(RunStatus::Failed, format!("wait failed: {e}"));
        }
        if let Some(e) = drain_error {
            result = result.with_status(RunStatus::TranscriptError, e);
        }
        if result.is_success() {
            if let Some((status, message)) = self.scan_markers(&handle).await {
                result = result.with_status(status, message);
            }
        }

        match result.status {
            RunStatus::Passed => info!("{} passed in {}ms", label, duration_ms),
            _ => warn!("{}", result),
        }

        result
    }

    /// Wait for the readers with a grace period, never past `deadline`.
    /// Returns a description of the first problem, if any.
    async fn drain(&self, handle: &mut WorkerHandle, deadline: Instant) -> Option<String> {
        let readers = std::mem::take(&mut handle.readers);
        let aborts: Vec<AbortHandle> = readers.iter().map(|r| r.abort_handle()).collect();
        let started = Instant::now();
        let until = (started + self.drain_grace).min(deadline);

        match timeout_at(until, join_all(readers)).await {
            Ok(outcomes) => outcomes.into_iter().find_map(|outcome| match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(format!("output read failed: {e}")),
                Err(e) => Some(format!("output reader failed: {e}")),
            }),
            Err(_) => {
                for abort in &aborts {
                    abort.abort();
                }
                Some(format!(
                    "output still open {}ms after exit; transcript may be incomplete",
                    started.elapsed().as_millis()
                ))
            }
        }
    }

    /// Look for failure markers in the transcript
    async fn scan_markers(&self, handle: &WorkerHandle) -> Option<(RunStatus, String)> {
        if self.failure_markers.is_empty() {
            return None;
        }

        let bytes = match tokio::fs::read(handle.transcript()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return Some((
                    RunStatus::TranscriptError,
                    format!("cannot read transcript: {e}"),
                ))
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        self.failure_markers
            .iter()
            .find(|m| text.contains(m.as_str()))
            .map(|m| (RunStatus::MarkerFound, format!("found failure marker {m:?}")))
    }
}
