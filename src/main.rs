//! suite-splitter - parallel test suite orchestrator
//!
//! Splits an ordered list of test ids into N groups, runs each group in its
//! own isolated child process, streams every child's output to the console
//! with a group prefix, and exits 0 only when every group passed.
//!
//! ## Usage
//!
//! ```bash
//! # Run the discovered suite across 4 workers
//! suite-splitter run -n 4 --runner pytest --runner-arg -q
//!
//! # Run selected tests
//! suite-splitter run -n 2 --runner ./run-e2e.sh t_login t_logout t_search
//!
//! # Preview the split
//! suite-splitter plan -n 3 --tests-from tests.txt
//!
//! # Inspect saved runs
//! suite-splitter results list
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::{error, info, warn};

mod cli;
mod config;
mod discovery;
mod executor;
mod models;
mod output;
mod results;
mod utils;

use cli::Args;
use config::{AppConfig, ConfigFile, EnvConfig};
use executor::{ConsoleSink, ParallelExecutor, Partitioner};
use output::{OutputFormat, ResultFormatter};
use results::{ExportFormat, ResultsStorage};
use utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    let level = match args.log_level.as_deref() {
        Some(name) => LogLevel::from_str(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown log level: {name}"))?,
        None => LogLevel::from_verbose(args.verbose || env.verbose.unwrap_or(false)),
    };
    init_logger(level);

    match args.command {
        cli::Command::Run(run_args) => match run_suite(run_args, &env).await {
            Ok(0) => {}
            Ok(code) => std::process::exit(code),
            Err(e) => {
                error!("{e:#}");
                std::process::exit(models::FAILURE_EXIT_CODE);
            }
        },
        cli::Command::Plan(plan_args) => {
            plan_suite(plan_args, &env).await?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, &env)?;
        }
        cli::Command::Results(results_args) => {
            show_results(results_args)?;
        }
    }

    Ok(())
}

/// Layer file, environment and the shared selection flags
fn load_config(select: &cli::SelectArgs, env: &EnvConfig) -> Result<AppConfig> {
    let path = select.config.as_deref().or(env.config_file.as_deref());
    let mut app = ConfigFile::load_or_default(path)?.app;
    app.apply_env(env);

    if let Some(workers) = select.workers {
        app.workers = workers;
    }

    Ok(app)
}

fn parse_format(name: &str) -> Result<OutputFormat> {
    OutputFormat::from_str(name).ok_or_else(|| anyhow::anyhow!("Unknown output format: {name}"))
}

/// An explicit `--format` wins over the configured one
fn report_format(flag: Option<&str>, app: &AppConfig) -> Result<OutputFormat> {
    parse_format(flag.unwrap_or(&app.format))
}

async fn run_suite(args: cli::RunArgs, env: &EnvConfig) -> Result<i32> {
    let mut app = load_config(&args.select, env)?;

    if let Some(runner) = args.runner {
        app.runner.program = runner;
    }
    if !args.runner_args.is_empty() {
        app.runner.args = args.runner_args;
    }
    app.runner.env.extend(args.env);
    if let Some(timeout) = args.timeout {
        app.worker_timeout_secs = Some(timeout);
    }
    if let Some(timeout) = args.overall_timeout {
        app.overall_timeout_secs = timeout;
    }
    if let Some(dir) = args.transcript_dir {
        app.transcript_dir = Some(dir);
    }
    if args.no_color {
        app.color = false;
    }

    let format = report_format(args.format.as_deref(), &app)?;
    app.validate_for_run()?;

    let suite = discovery::resolve_suite(
        &args.select.tests,
        args.select.tests_from.as_deref(),
        &app.discovery,
    )
    .await?;

    let color = app.color;
    let overall = ParallelExecutor::new(app)
        .run(&suite, ConsoleSink::stdout().colorize(color))
        .await?;

    let formatter = ResultFormatter::new(format).colorize(color);
    println!("{}", formatter.format_overall(&overall));

    if let Some(path) = &args.output {
        output::write_results_to_file(path, &overall, format)?;
        info!("Report written to {}", path);
    }

    if args.save {
        match ResultsStorage::default_dir().save(&overall) {
            Ok(path) => info!("Run saved as {} ({})", overall.run_id, path.display()),
            Err(e) => warn!("Failed to save run {}: {:#}", overall.run_id, e),
        }
    }

    Ok(overall.exit_code())
}

async fn plan_suite(args: cli::PlanArgs, env: &EnvConfig) -> Result<()> {
    let app = load_config(&args.select, env)?;
    let format = report_format(args.format.as_deref(), &app)?;

    let suite = discovery::resolve_suite(
        &args.select.tests,
        args.select.tests_from.as_deref(),
        &app.discovery,
    )
    .await?;

    let partitions = Partitioner::new(app.workers)?.split_non_empty(&suite);
    info!(
        "{} tests in {} group(s) (workers: {})",
        suite.len(),
        partitions.len(),
        app.workers
    );

    let formatter = ResultFormatter::new(format);
    print!("{}", formatter.format_plan(&partitions));

    Ok(())
}

fn manage_config(args: cli::ConfigArgs, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            let path = Path::new(&output);
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {output}. Use --force to overwrite."
                );
            }

            ConfigFile::example().save(path)?;
            println!("✓ Configuration file created: {output}");
            println!("\nEdit the runner and discovery sections for your suite.");
        }

        cli::ConfigAction::Show {
            env: show_env,
            format,
        } => {
            if show_env {
                if !env.has_any() {
                    println!("No {}_* variables set", config::ENV_PREFIX);
                }
                env.print_summary();
            } else {
                let mut config = ConfigFile::load_or_default(env.config_file.as_deref())?;
                config.app.apply_env(env);
                let output = if format == "json" {
                    serde_json::to_string_pretty(&config)?
                } else {
                    serde_yaml::to_string(&config)?
                };
                println!("{output}");
            }
        }

        cli::ConfigAction::Validate { file } => {
            let path = file
                .or_else(|| env.config_file.clone())
                .or_else(|| ConfigFile::find().map(|p| p.to_string_lossy().to_string()))
                .unwrap_or_else(|| "./suite-splitter.yaml".to_string());

            match ConfigFile::load(&path) {
                Ok(_) => {
                    println!("✓ Configuration file is valid: {path}");
                }
                Err(e) => {
                    println!("✗ Configuration file is invalid: {path}");
                    println!("  Error: {e:#}");
                    return Err(e);
                }
            }
        }

        cli::ConfigAction::Env => {
            config::print_env_help();
        }
    }

    Ok(())
}

fn show_results(args: cli::ResultsArgs) -> Result<()> {
    let storage = match args.dir {
        Some(dir) => ResultsStorage::new(dir),
        None => ResultsStorage::default_dir(),
    };

    match args.action {
        cli::ResultsAction::List { limit } => {
            let runs = storage.list_runs()?;
            if runs.is_empty() {
                println!("\nNo saved runs in {}", storage.base_dir().display());
                println!("   Save one with: suite-splitter run --save");
                return Ok(());
            }

            println!(
                "\n{:<22} {:<20} {:>7} {:>7} {:>7}  Result",
                "Run", "Started", "Groups", "Passed", "Tests"
            );
            println!("{:-<80}", "");
            for run in runs.iter().take(limit.unwrap_or(usize::MAX)) {
                println!(
                    "{:<22} {:<20} {:>7} {:>7} {:>7}  {}",
                    run.id,
                    run.started_at.format("%Y-%m-%d %H:%M:%S"),
                    run.groups,
                    run.passed,
                    run.total_tests,
                    if run.success { "PASS" } else { "FAIL" }
                );
            }
            println!();
        }

        cli::ResultsAction::Show { run_id, format } => {
            let run = match run_id {
                Some(id) => storage.load(&id)?,
                None => storage
                    .latest()?
                    .context("No saved runs; use `suite-splitter run --save`")?,
            };
            let formatter = ResultFormatter::new(parse_format(&format)?);
            println!("{}", formatter.format_overall(&run));
        }

        cli::ResultsAction::Export {
            run_id,
            output,
            format,
        } => {
            let path = Path::new(&output);
            let format = match format {
                Some(name) => ExportFormat::from_str(&name)
                    .ok_or_else(|| anyhow::anyhow!("Unknown export format: {name}"))?,
                None => ExportFormat::from_extension(path).unwrap_or(ExportFormat::Json),
            };

            let run = storage.load(&run_id)?;
            storage.export(&run, path, format)?;
            println!("✓ Exported run {run_id} to {output}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_format_falls_back_to_config() {
        let app = AppConfig {
            format: "csv".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(report_format(None, &app).unwrap(), OutputFormat::Csv);
        assert_eq!(report_format(Some("json"), &app).unwrap(), OutputFormat::Json);
        assert!(report_format(Some("xml"), &app).is_err());
    }
}
