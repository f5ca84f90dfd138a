//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration. These are
//! read once at startup; nothing here writes the process environment
//! outside of tests.

use std::env;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SUITE_SPLITTER";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Worker count from SUITE_SPLITTER_WORKERS
    pub workers: Option<usize>,
    /// Runner program from SUITE_SPLITTER_RUNNER
    pub runner: Option<String>,
    /// Per-worker timeout from SUITE_SPLITTER_TIMEOUT
    pub timeout: Option<u64>,
    /// Overall timeout from SUITE_SPLITTER_OVERALL_TIMEOUT
    pub overall_timeout: Option<u64>,
    /// Output format from SUITE_SPLITTER_FORMAT
    pub format: Option<String>,
    /// Config file from SUITE_SPLITTER_CONFIG
    pub config_file: Option<String>,
    /// Verbose from SUITE_SPLITTER_VERBOSE
    pub verbose: Option<bool>,
    /// Transcript directory from SUITE_SPLITTER_TRANSCRIPT_DIR
    pub transcript_dir: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            workers: get_env_parse("WORKERS"),
            runner: get_env("RUNNER"),
            timeout: get_env_parse("TIMEOUT"),
            overall_timeout: get_env_parse("OVERALL_TIMEOUT"),
            format: get_env("FORMAT"),
            config_file: get_env("CONFIG"),
            verbose: get_env_bool("VERBOSE"),
            transcript_dir: get_env("TRANSCRIPT_DIR"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.workers.is_some()
            || self.runner.is_some()
            || self.timeout.is_some()
            || self.overall_timeout.is_some()
            || self.format.is_some()
            || self.config_file.is_some()
            || self.verbose.is_some()
            || self.transcript_dir.is_some()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_WORKERS:         {:?}", ENV_PREFIX, self.workers);
        println!("  {}_RUNNER:          {:?}", ENV_PREFIX, self.runner);
        println!("  {}_TIMEOUT:         {:?}", ENV_PREFIX, self.timeout);
        println!("  {}_OVERALL_TIMEOUT: {:?}", ENV_PREFIX, self.overall_timeout);
        println!("  {}_FORMAT:          {:?}", ENV_PREFIX, self.format);
        println!("  {}_CONFIG:          {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_VERBOSE:         {:?}", ENV_PREFIX, self.verbose);
        println!("  {}_TRANSCRIPT_DIR:  {:?}", ENV_PREFIX, self.transcript_dir);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Print all SUITE_SPLITTER environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_WORKERS          Number of worker processes");
    println!("  {ENV_PREFIX}_RUNNER           Test runner executable");
    println!("  {ENV_PREFIX}_TIMEOUT          Per-worker timeout in seconds");
    println!("  {ENV_PREFIX}_OVERALL_TIMEOUT  Whole-run timeout in seconds");
    println!("  {ENV_PREFIX}_FORMAT           Report format (table, summary, json, csv)");
    println!("  {ENV_PREFIX}_CONFIG           Path to configuration file");
    println!("  {ENV_PREFIX}_VERBOSE          Enable debug logging (true/false)");
    println!("  {ENV_PREFIX}_TRANSCRIPT_DIR   Directory for worker transcripts");
    println!();
    println!("Set on every worker:");
    println!("  {ENV_PREFIX}_GROUP            One-based group number");
    println!("  {ENV_PREFIX}_GROUP_COUNT      Number of launched groups");
    println!("  {ENV_PREFIX}_TMPDIR           Private scratch directory (also TMPDIR, TMP, TEMP)");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_WORKERS=2");
    println!("  export {ENV_PREFIX}_RUNNER=pytest");
    println!("  suite-splitter run");
}
