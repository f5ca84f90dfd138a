//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};

/// Split a test suite across parallel worker processes
#[derive(Parser, Debug)]
#[command(name = "suite-splitter")]
#[command(version)]
#[command(about = "Run a test suite split across N isolated worker processes")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error); overrides --verbose
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the suite in parallel groups
    Run(RunArgs),

    /// Show how the suite would be split without running it
    Plan(PlanArgs),

    /// Manage configuration
    Config(ConfigArgs),

    /// View saved run results
    Results(ResultsArgs),
}

/// Options shared by `run` and `plan` for selecting tests and groups
#[derive(Parser, Debug, Clone)]
pub struct SelectArgs {
    /// Test ids to run; the full discovered suite when empty
    pub tests: Vec<String>,

    /// Read additional test ids from a file, one per line
    #[arg(long, value_name = "FILE")]
    pub tests_from: Option<String>,

    /// Number of worker processes
    #[arg(short = 'n', long)]
    pub workers: Option<usize>,

    /// Configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<String>,
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Test runner program
    #[arg(short, long)]
    pub runner: Option<String>,

    /// Argument passed to the runner before the test ids (repeatable)
    #[arg(long = "runner-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub runner_args: Vec<String>,

    /// Extra environment variable for every worker (KEY=VALUE, repeatable)
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub env: Vec<(String, String)>,

    /// Per-worker timeout in seconds
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Timeout for the whole run in seconds
    #[arg(long, value_name = "SECS")]
    pub overall_timeout: Option<u64>,

    /// Directory for worker transcripts
    #[arg(long, value_name = "DIR")]
    pub transcript_dir: Option<String>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Write the report to a file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<String>,

    /// Save the run summary to the results store
    #[arg(short, long)]
    pub save: bool,
}

/// Arguments for plan command
#[derive(Parser, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Output format (table, json, json-pretty, csv, summary); the configured format when omitted
    #[arg(short, long)]
    pub format: Option<String>,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "./suite-splitter.yaml")]
        output: String,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Show environment overrides instead
        #[arg(short, long)]
        env: bool,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Validate a configuration file
    Validate {
        /// File to validate; the discovered file when omitted
        file: Option<String>,
    },

    /// List supported environment variables
    Env,
}

/// Arguments for results command
#[derive(Parser, Debug)]
pub struct ResultsArgs {
    #[command(subcommand)]
    pub action: ResultsAction,

    /// Results directory
    #[arg(long, global = true, value_name = "DIR")]
    pub dir: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ResultsAction {
    /// List saved runs
    List {
        /// Show at most this many runs
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one run; the latest when no id is given
    Show {
        run_id: Option<String>,

        /// Output format (table, json, json-pretty, csv, summary)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Export one run to JSON or CSV
    Export {
        run_id: String,

        /// Destination file; format follows the extension unless --format is given
        output: String,

        /// Export format (json, csv)
        #[arg(short, long)]
        format: Option<String>,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty variable name in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args() {
        let args = Args::parse_from([
            "suite-splitter",
            "run",
            "--workers",
            "3",
            "--runner",
            "pytest",
            "--runner-arg",
            "-x",
            "--runner-arg",
            "-q",
            "--env",
            "E2E_HEADLESS=1",
            "--no-color",
            "t1",
            "t2",
        ]);
        match args.command {
            Command::Run(run) => {
                assert_eq!(run.select.workers, Some(3));
                assert_eq!(run.runner.as_deref(), Some("pytest"));
                assert_eq!(run.runner_args, ["-x", "-q"]);
                assert_eq!(run.env, [("E2E_HEADLESS".to_string(), "1".to_string())]);
                assert_eq!(run.select.tests, ["t1", "t2"]);
                assert!(run.no_color);
                assert!(!run.save);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_plan_without_ids() {
        let args = Args::parse_from(["suite-splitter", "-v", "plan", "-n", "4"]);
        assert!(args.verbose);
        match args.command {
            Command::Plan(plan) => {
                assert!(plan.select.tests.is_empty());
                assert_eq!(plan.select.workers, Some(4));
                assert!(plan.format.is_none());
            }
            _ => panic!("Expected Plan command"),
        }

        let args = Args::parse_from(["suite-splitter", "plan", "--format", "csv"]);
        match args.command {
            Command::Plan(plan) => assert_eq!(plan.format.as_deref(), Some("csv")),
            _ => panic!("Expected Plan command"),
        }
    }

    #[test]
    fn test_results_export() {
        let args = Args::parse_from([
            "suite-splitter",
            "results",
            "export",
            "20260101-000000-000",
            "out.csv",
        ]);
        match args.command {
            Command::Results(results) => match results.action {
                ResultsAction::Export { run_id, output, format } => {
                    assert_eq!(run_id, "20260101-000000-000");
                    assert_eq!(output, "out.csv");
                    assert!(format.is_none());
                }
                _ => panic!("Expected Export action"),
            },
            _ => panic!("Expected Results command"),
        }
    }

    #[test]
    fn test_bad_env_pair_rejected() {
        let outcome = Args::try_parse_from(["suite-splitter", "run", "--env", "NOVALUE"]);
        assert!(outcome.is_err());
    }
}
