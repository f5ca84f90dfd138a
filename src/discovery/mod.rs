//! Test discovery
//!
//! Resolves the list of test ids to run: explicit ids and id files first,
//! the configured discovery source when neither is given.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::DiscoveryConfig;
use crate::executor::SplitError;
use crate::models::TestSuite;

/// Parse one id per line, skipping blank lines and `#` comments
pub fn parse_ids(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read ids from a file
pub async fn read_id_file(path: impl AsRef<Path>) -> Result<Vec<String>, SplitError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SplitError::Discovery(format!("cannot read {}: {e}", path.display())))?;
    Ok(parse_ids(&text))
}

/// Run the discovery command and collect the ids it prints
pub async fn run_discovery_command(command: &[String]) -> Result<Vec<String>, SplitError> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| SplitError::Discovery("empty discovery command".to_string()))?;

    debug!("Discovering tests with {:?}", command);
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| SplitError::Discovery(format!("cannot run {program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SplitError::Discovery(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        )));
    }

    Ok(parse_ids(&String::from_utf8_lossy(&output.stdout)))
}

/// Ask the configured source for the full suite
pub async fn discover(config: &DiscoveryConfig) -> Result<Vec<String>, SplitError> {
    if !config.is_configured() {
        return Err(SplitError::NoDiscoverySource);
    }
    match &config.file {
        Some(file) if config.command.is_empty() => read_id_file(file).await,
        _ => run_discovery_command(&config.command).await,
    }
}

/// Build the suite for an invocation.
///
/// Ids from the command line and from `tests_from` are combined; only when
/// both are absent is the discovery source consulted.
pub async fn resolve_suite(
    ids: &[String],
    tests_from: Option<&str>,
    discovery: &DiscoveryConfig,
) -> Result<TestSuite, SplitError> {
    let mut requested = ids.to_vec();
    if let Some(path) = tests_from {
        requested.extend(read_id_file(path).await?);
    }

    let suite = if requested.is_empty() && tests_from.is_none() {
        let discovered = discover(discovery).await?;
        info!("Discovered {} tests", discovered.len());
        TestSuite::new(discovered)
    } else {
        let requested_len = requested.len();
        let suite = TestSuite::new(requested);
        if suite.len() < requested_len {
            debug!("Dropped {} duplicate id(s)", requested_len - suite.len());
        }
        suite
    };

    Ok(suite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_ids() {
        let ids = parse_ids("t1\n\n# skipped\n  t2  \r\nt3");
        assert_eq!(ids, ["t1", "t2", "t3"]);
    }

    #[tokio::test]
    async fn test_read_id_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tests.txt");
        std::fs::write(&path, "a\nb\n").unwrap();

        assert_eq!(read_id_file(&path).await.unwrap(), ["a", "b"]);
        assert!(read_id_file(dir.path().join("missing.txt")).await.is_err());
    }

    #[tokio::test]
    async fn test_explicit_ids_skip_discovery() {
        let ids = vec!["t1".to_string(), "t1".to_string(), "t2".to_string()];
        let suite = resolve_suite(&ids, None, &DiscoveryConfig::default())
            .await
            .unwrap();
        assert_eq!(suite.tests(), ["t1", "t2"]);
    }

    #[tokio::test]
    async fn test_no_source_is_an_error() {
        let outcome = resolve_suite(&[], None, &DiscoveryConfig::default()).await;
        assert!(matches!(outcome, Err(SplitError::NoDiscoverySource)));
    }

    #[tokio::test]
    async fn test_discovery_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("suite.txt");
        std::fs::write(&path, "x\ny\nx\n").unwrap();

        let config = DiscoveryConfig {
            command: Vec::new(),
            file: Some(path.to_string_lossy().into_owned()),
        };
        let suite = resolve_suite(&[], None, &config).await.unwrap();
        assert_eq!(suite.tests(), ["x", "y"]);
    }

    #[test]
    fn test_empty_command_rejected() {
        let outcome = tokio_test::block_on(run_discovery_command(&[]));
        assert!(matches!(outcome, Err(SplitError::Discovery(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_discovery_command() {
        let command = vec![
            "sh".to_string(),
            "-c".to_string(),
            "printf 'a\\nb\\n'".to_string(),
        ];
        assert_eq!(run_discovery_command(&command).await.unwrap(), ["a", "b"]);

        let failing = vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()];
        assert!(run_discovery_command(&failing).await.is_err());
    }
}
