//! Configuration module
//!
//! Handles loading and layering configuration: file, then environment,
//! then command-line flags.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig, ENV_PREFIX};
pub use file::ConfigFile;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::executor::SplitError;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Number of worker processes the suite is split across
    pub workers: usize,

    /// Test-execution entry point invoked by every worker
    pub runner: RunnerConfig,

    /// Where the full suite comes from when no ids are given
    pub discovery: DiscoveryConfig,

    /// Per-worker timeout in seconds; unset means no limit
    pub worker_timeout_secs: Option<u64>,

    /// Upper bound on the whole run in seconds
    pub overall_timeout_secs: u64,

    /// How long readers may keep draining after their worker exits
    pub drain_grace_secs: u64,

    /// Directory for transcripts; a fresh temp directory when unset
    pub transcript_dir: Option<String>,

    /// Transcript substrings that fail a group even on exit code 0
    pub failure_markers: Vec<String>,

    /// Report format (table, summary, json, json-pretty, csv)
    pub format: String,

    /// Colorize console output
    pub color: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            runner: RunnerConfig::default(),
            discovery: DiscoveryConfig::default(),
            worker_timeout_secs: None,
            overall_timeout_secs: 3600,
            drain_grace_secs: 5,
            transcript_dir: None,
            failure_markers: Vec::new(),
            format: "table".to_string(),
            color: true,
        }
    }
}

impl AppConfig {
    pub fn worker_timeout(&self) -> Option<Duration> {
        self.worker_timeout_secs.map(Duration::from_secs)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.overall_timeout_secs)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_secs(self.drain_grace_secs)
    }

    pub fn transcript_dir(&self) -> Option<PathBuf> {
        self.transcript_dir.as_ref().map(PathBuf::from)
    }

    /// Apply environment overrides on top of file values
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(workers) = env.workers {
            self.workers = workers;
        }
        if let Some(runner) = &env.runner {
            self.runner.program = runner.clone();
        }
        if let Some(timeout) = env.timeout {
            self.worker_timeout_secs = Some(timeout);
        }
        if let Some(timeout) = env.overall_timeout {
            self.overall_timeout_secs = timeout;
        }
        if let Some(format) = &env.format {
            self.format = format.clone();
        }
        if let Some(dir) = &env.transcript_dir {
            self.transcript_dir = Some(dir.clone());
        }
    }

    /// Check the settings a run depends on
    pub fn validate_for_run(&self) -> Result<(), SplitError> {
        if self.workers == 0 {
            return Err(SplitError::InvalidWorkerCount(self.workers));
        }
        if self.runner.program.trim().is_empty() {
            return Err(SplitError::MissingRunner);
        }
        if self.overall_timeout_secs == 0 {
            return Err(SplitError::InvalidConfig(
                "overall_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.drain_grace_secs == 0 {
            return Err(SplitError::InvalidConfig(
                "drain_grace_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Test-execution entry point shared by all workers
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Executable to spawn
    pub program: String,

    /// Fixed arguments placed before the test ids
    pub args: Vec<String>,

    /// Extra variables set on every worker
    pub env: BTreeMap<String, String>,

    /// Working directory for workers; the parent's when unset
    pub working_dir: Option<String>,
}

impl RunnerConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Source of the canonical test list
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Command printing one test id per line
    pub command: Vec<String>,

    /// File listing one test id per line
    pub file: Option<String>,
}

impl DiscoveryConfig {
    pub fn is_configured(&self) -> bool {
        !self.command.is_empty() || self.file.is_some()
    }
}
