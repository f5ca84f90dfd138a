//! Results storage and retrieval
//!
//! Persists run summaries as JSON, one file per run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::OverallResult;
use crate::output::results_csv;

/// Results storage manager
pub struct ResultsStorage {
    /// Base directory for results
    base_dir: PathBuf,
}

impl ResultsStorage {
    /// Create a new results storage
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Create with default directory
    pub fn default_dir() -> Self {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("suite-splitter")
            .join("results");
        Self::new(base_dir)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get path for a specific run
    fn run_path(&self, run_id: &str) -> PathBuf {
        self.base_dir.join(format!("{run_id}.json"))
    }

    /// Save a run summary
    pub fn save(&self, run: &OverallResult) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create results directory: {}",
                self.base_dir.display()
            )
        })?;

        let path = self.run_path(&run.run_id);
        let file = File::create(&path).context("Failed to create results file")?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, run).context("Failed to write results")?;

        info!("Saved run results to {}", path.display());
        Ok(path)
    }

    /// Load a run by id
    pub fn load(&self, run_id: &str) -> Result<OverallResult> {
        let path = self.run_path(run_id);
        let run = Self::load_from_path(&path)
            .with_context(|| format!("No readable results for run {run_id}"))?;

        debug!("Loaded run results from {}", path.display());
        Ok(run)
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<OverallResult> {
        let file = File::open(path).context("Failed to open results file")?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).context("Failed to parse results")
    }

    /// List saved runs, newest first
    pub fn list_runs(&self) -> Result<Vec<RunInfo>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match Self::load_from_path(&path) {
                    Ok(run) => runs.push(RunInfo::from(&run)),
                    Err(e) => debug!("Skipping {}: {}", path.display(), e),
                }
            }
        }

        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    /// Get the most recent run
    pub fn latest(&self) -> Result<Option<OverallResult>> {
        match self.list_runs()?.first() {
            Some(info) => self.load(&info.id).map(Some),
            None => Ok(None),
        }
    }

    /// Export run to a file
    pub fn export(&self, run: &OverallResult, path: &Path, format: ExportFormat) -> Result<()> {
        match format {
            ExportFormat::Json => {
                let file = File::create(path)?;
                let writer = BufWriter::new(file);
                serde_json::to_writer_pretty(writer, run)?;
            }
            ExportFormat::Csv => {
                fs::write(path, results_csv(&run.results)?)?;
            }
        }

        info!("Exported results to {}", path.display());
        Ok(())
    }
}

/// Brief run information
#[derive(Clone, Debug)]
pub struct RunInfo {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub groups: usize,
    pub passed: usize,
    pub total_tests: usize,
    pub success: bool,
}

impl From<&OverallResult> for RunInfo {
    fn from(run: &OverallResult) -> Self {
        Self {
            id: run.run_id.clone(),
            started_at: run.started_at,
            groups: run.groups,
            passed: run.passed,
            total_tests: run.total_tests,
            success: run.is_success(),
        }
    }
}

/// Export format
#[derive(Clone, Copy, Debug)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunResult;
    use chrono::Duration;
    use tempfile::tempdir;

    fn run_at(started_at: DateTime<Utc>, exit_code: i32) -> OverallResult {
        let results = vec![RunResult::exited(
            0,
            vec!["t1".into()],
            Some(exit_code),
            started_at,
            50,
        )];
        OverallResult::new(started_at, results)
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path().join("results"));

        let run = run_at(Utc::now(), 0);
        let path = storage.save(&run).unwrap();
        assert!(path.ends_with(format!("{}.json", run.run_id)));

        let loaded = storage.load(&run.run_id).unwrap();
        assert_eq!(loaded.run_id, run.run_id);
        assert_eq!(loaded.results[0].tests, ["t1"]);
        assert!(storage.load("missing").is_err());
    }

    #[test]
    fn test_list_runs_newest_first() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path());
        assert!(storage.list_runs().unwrap().is_empty());

        let older = run_at(Utc::now() - Duration::minutes(5), 1);
        let newer = run_at(Utc::now(), 0);
        storage.save(&older).unwrap();
        storage.save(&newer).unwrap();
        std::fs::write(dir.path().join("junk.json"), "not json").unwrap();

        let runs = storage.list_runs().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, newer.run_id);
        assert!(runs[0].success);
        assert!(!runs[1].success);

        let latest = storage.latest().unwrap().unwrap();
        assert_eq!(latest.run_id, newer.run_id);
    }

    #[test]
    fn test_export_csv() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path());
        let path = dir.path().join("run.csv");

        storage
            .export(&run_at(Utc::now(), 2), &path, ExportFormat::Csv)
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("group,tests,status"));
        assert!(content.contains("1,t1,FAIL,2,50"));
    }

    #[test]
    fn test_export_format() {
        assert!(matches!(
            ExportFormat::from_str("json"),
            Some(ExportFormat::Json)
        ));
        assert!(matches!(
            ExportFormat::from_extension(Path::new("out.CSV")),
            Some(ExportFormat::Csv)
        ));
        assert!(ExportFormat::from_str("unknown").is_none());
    }
}
