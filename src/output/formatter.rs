//! Report formatters for run results
//!
//! Provides Table, JSON, CSV and summary renderings of an `OverallResult`,
//! plus the partition listing used by `plan`.

use anyhow::{Context, Result};
use std::io::Write;

use crate::models::{OverallResult, Partition, RunResult, RunStatus};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    pub fn colorize(mut self, enabled: bool) -> Self {
        self.colorize = enabled;
        self
    }

    /// Format the outcome of a whole run
    pub fn format_overall(&self, overall: &OverallResult) -> String {
        match self.format {
            OutputFormat::Table => self.format_overall_table(overall),
            OutputFormat::Json => serde_json::to_string(overall).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(overall).unwrap_or_default(),
            OutputFormat::Csv => results_csv(&overall.results).unwrap_or_default(),
            OutputFormat::Summary => self.format_overall_brief(overall),
        }
    }

    fn status_label(&self, status: RunStatus) -> String {
        let label = format!("{} {}", status.symbol(), status);
        if !self.colorize {
            return label;
        }
        let color = match status {
            RunStatus::Passed => 32,
            RunStatus::Timeout => 33,
            _ => 31,
        };
        format!("\x1b[{color}m{label}\x1b[0m")
    }

    fn format_result_row(&self, result: &RunResult) -> String {
        let exit = match result.exit_code {
            Some(code) => code.to_string(),
            None => "-".to_string(),
        };
        format!(
            " g{:<4} {:>6} {:>6} {:>9}ms  {}",
            result.group(),
            result.tests.len(),
            exit,
            result.duration_ms,
            self.status_label(result.status)
        )
    }

    fn format_overall_table(&self, overall: &OverallResult) -> String {
        let mut output = String::new();

        output.push_str("\n═══════════════════════════════════════════════════════════════\n");
        output.push_str(&format!(
            " Run {} ({})\n",
            overall.run_id,
            overall.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        output.push_str("═══════════════════════════════════════════════════════════════\n");

        if overall.results.is_empty() {
            output.push_str(" No tests to run\n");
        } else {
            output.push_str(" Group   Tests   Exit    Duration  Status\n");
            output.push_str(" ───────────────────────────────────────────────────────────\n");
            for result in &overall.results {
                output.push_str(&self.format_result_row(result));
                output.push('\n');
                if let Some(msg) = &result.message {
                    output.push_str(&format!("        {msg}\n"));
                }
            }
            output.push_str(" ───────────────────────────────────────────────────────────\n");
        }

        let failed = if self.colorize && overall.failed > 0 {
            format!("\x1b[31m{}\x1b[0m", overall.failed)
        } else {
            overall.failed.to_string()
        };
        let passed = if self.colorize {
            format!("\x1b[32m{}\x1b[0m", overall.passed)
        } else {
            overall.passed.to_string()
        };

        output.push_str(&format!(
            " Groups: {} | Pass: {} | Fail: {} | Tests: {}\n",
            overall.groups, passed, failed, overall.total_tests
        ));
        output.push_str(&format!(" Wall clock: {}ms\n", overall.wall_clock_ms));

        let transcripts: Vec<_> = overall
            .results
            .iter()
            .filter_map(|r| r.transcript.as_ref().map(|p| (r.group(), p)))
            .collect();
        if !transcripts.is_empty() {
            output.push_str("\n Transcripts:\n");
            for (group, path) in transcripts {
                output.push_str(&format!("   g{}: {}\n", group, path.display()));
            }
        }

        output
    }

    fn format_overall_brief(&self, overall: &OverallResult) -> String {
        let verdict = if overall.is_success() { "PASS" } else { "FAIL" };
        format!(
            "{}: {}/{} groups passed ({} tests) in {}ms",
            verdict, overall.passed, overall.groups, overall.total_tests, overall.wall_clock_ms
        )
    }

    /// Format the partition assignment without running anything
    pub fn format_plan(&self, partitions: &[Partition]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(partitions).unwrap_or_default(),
            OutputFormat::JsonPretty => {
                serde_json::to_string_pretty(partitions).unwrap_or_default()
            }
            OutputFormat::Csv => plan_csv(partitions).unwrap_or_default(),
            OutputFormat::Table | OutputFormat::Summary => {
                let mut output = String::new();
                for partition in partitions {
                    output.push_str(&format!("{partition}\n"));
                    if self.format == OutputFormat::Table {
                        for test in &partition.tests {
                            output.push_str(&format!("    {test}\n"));
                        }
                    }
                }
                output
            }
        }
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn csv_string(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer.into_inner().context("Failed to flush CSV")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// One row per group
pub(crate) fn results_csv(results: &[RunResult]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "group",
        "tests",
        "status",
        "exit_code",
        "duration_ms",
        "transcript",
        "message",
    ])?;

    for result in results {
        writer.write_record([
            result.group().to_string(),
            result.tests.join(" "),
            result.status.to_string(),
            result.exit_code.map(|c| c.to_string()).unwrap_or_default(),
            result.duration_ms.to_string(),
            result
                .transcript
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            result.message.clone().unwrap_or_default(),
        ])?;
    }

    csv_string(writer)
}

fn plan_csv(partitions: &[Partition]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["group", "test"])?;
    for partition in partitions {
        for test in &partition.tests {
            writer.write_record([partition.label().as_str(), test.as_str()])?;
        }
    }
    csv_string(writer)
}

/// Write an uncolored report to a file
pub fn write_results_to_file(
    path: &str,
    overall: &OverallResult,
    format: OutputFormat,
) -> Result<()> {
    let formatter = ResultFormatter::new(format).no_color();
    let content = formatter.format_overall(overall);

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report file: {path}"))?;
    file.write_all(content.as_bytes())?;
    if !content.ends_with('\n') {
        file.write_all(b"\n")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> OverallResult {
        let results = vec![
            RunResult::exited(0, vec!["t1".into(), "t2".into()], Some(0), Utc::now(), 120)
                .with_transcript("/tmp/run/g1.log"),
            RunResult::exited(1, vec!["t3".into()], Some(1), Utc::now(), 80)
                .with_transcript("/tmp/run/g2.log"),
        ];
        OverallResult::new(Utc::now(), results)
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("TABLE"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::from_str("unknown"), None);
    }

    #[test]
    fn test_formatter_creation() {
        let formatter = ResultFormatter::new(OutputFormat::Json).no_color();
        assert_eq!(formatter.format, OutputFormat::Json);
        assert!(!formatter.colorize);
        assert!(ResultFormatter::default().colorize(true).colorize);
    }

    #[test]
    fn test_table_lists_groups_and_transcripts() {
        let output = ResultFormatter::new(OutputFormat::Table)
            .no_color()
            .format_overall(&sample());

        assert!(output.contains("✓ PASS"));
        assert!(output.contains("✗ FAIL"));
        assert!(output.contains("Pass: 1 | Fail: 1 | Tests: 3"));
        assert!(output.contains("g2: /tmp/run/g2.log"));
        assert!(!output.contains("\x1b["));
    }

    #[test]
    fn test_table_colors_status() {
        let output = ResultFormatter::new(OutputFormat::Table).format_overall(&sample());
        assert!(output.contains("\x1b[32m✓ PASS\x1b[0m"));
        assert!(output.contains("\x1b[31m✗ FAIL\x1b[0m"));
    }

    #[test]
    fn test_summary_and_json() {
        let overall = sample();
        let brief = ResultFormatter::new(OutputFormat::Summary).format_overall(&overall);
        assert_eq!(brief, "FAIL: 1/2 groups passed (3 tests) in 120ms");

        let json = ResultFormatter::new(OutputFormat::Json).format_overall(&overall);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["failed"], 1);
        assert_eq!(value["results"][1]["status"], "failed");
    }

    #[test]
    fn test_csv_quotes_messages() {
        let results = vec![RunResult::launch_error(0, vec!["t1".into()], "bad, \"quoted\"")];
        let csv = results_csv(&results).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("group,tests,status,exit_code,duration_ms,transcript,message")
        );
        assert_eq!(lines.next(), Some("1,t1,LAUNCH ERROR,,0,,\"bad, \"\"quoted\"\"\""));
    }

    #[test]
    fn test_format_plan() {
        let partitions = vec![
            Partition::new(0, vec!["t1".into(), "t2".into()]),
            Partition::new(1, vec!["t3".into()]),
        ];
        let table = ResultFormatter::new(OutputFormat::Table).format_plan(&partitions);
        assert!(table.contains("group 1 (2 tests)"));
        assert!(table.contains("    t3\n"));

        let csv = ResultFormatter::new(OutputFormat::Csv).format_plan(&partitions);
        assert_eq!(csv, "group,test\ng1,t1\ng1,t2\ng2,t3\n");
    }

    #[test]
    fn test_write_results_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        let path = path.to_str().unwrap();

        write_results_to_file(path, &sample(), OutputFormat::Summary).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.starts_with("FAIL: 1/2"));
    }
}
