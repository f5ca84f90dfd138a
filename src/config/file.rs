//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{AppConfig, DiscoveryConfig, RunnerConfig};

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./suite-splitter.yaml",
    "./suite-splitter.yml",
    "./.suite-splitter.yaml",
    "~/.config/suite-splitter/config.yaml",
];

const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// Full configuration file structure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Application settings
    #[serde(default)]
    pub app: AppConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
        }
    }
}

impl ConfigFile {
    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self> {
        if let Some(path) = Self::find() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from an explicit path when given, otherwise the default location
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::load(expand_path(path)),
            None => Self::load_default(),
        }
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }

        if self.app.workers == 0 {
            anyhow::bail!("workers must be at least 1");
        }

        if self.app.overall_timeout_secs == 0 {
            anyhow::bail!("overall_timeout_secs must be at least 1");
        }

        if self.app.drain_grace_secs == 0 {
            anyhow::bail!("drain_grace_secs must be at least 1");
        }

        if let Some(timeout) = self.app.worker_timeout_secs {
            if timeout > self.app.overall_timeout_secs {
                anyhow::bail!(
                    "worker_timeout_secs ({}) exceeds overall_timeout_secs ({})",
                    timeout,
                    self.app.overall_timeout_secs
                );
            }
        }

        if self.app.runner.env.keys().any(|k| k.is_empty() || k.contains('=')) {
            anyhow::bail!("runner.env contains an invalid variable name");
        }

        if self.app.failure_markers.iter().any(|m| m.is_empty()) {
            anyhow::bail!("failure_markers must not contain empty strings");
        }

        Ok(())
    }

    /// Generate example configuration
    pub fn example() -> Self {
        Self {
            version: default_version(),
            app: AppConfig {
                workers: 2,
                runner: RunnerConfig::new("python")
                    .arg("-m")
                    .arg("pytest")
                    .arg("-v")
                    .env("E2E_RUNNING_UNDER_TEST", "1"),
                discovery: DiscoveryConfig {
                    command: vec!["./scripts/list-e2e-tests.sh".to_string()],
                    file: None,
                },
                worker_timeout_secs: Some(1800),
                failure_markers: vec!["INTERNALERROR".to_string()],
                ..AppConfig::default()
            },
        }
    }
}

/// Expand ~ to home directory
pub(crate) fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_file_default() {
        let config = ConfigFile::default();
        assert_eq!(config.version, "1.0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_example() {
        let config = ConfigFile::example();
        assert!(config.validate().is_ok());
        assert!(config.app.discovery.is_configured());
        assert_eq!(config.app.runner.program, "python");
    }

    #[test]
    fn test_config_file_save_load_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let config = ConfigFile::example();
        config.save(&path).unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded.version, config.version);
        assert_eq!(loaded.app.runner.args, config.app.runner.args);
        assert_eq!(loaded.app.failure_markers, config.app.failure_markers);
    }

    #[test]
    fn test_config_file_save_load_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        ConfigFile::example().save(&path).unwrap();
        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded.app.workers, 2);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ConfigFile::default();
        config.version = "9.9".to_string();
        assert!(config.validate().is_err());

        let mut config = ConfigFile::default();
        config.app.workers = 0;
        assert!(config.validate().is_err());

        let mut config = ConfigFile::default();
        config.app.worker_timeout_secs = Some(config.app.overall_timeout_secs + 1);
        assert!(config.validate().is_err());

        let mut config = ConfigFile::default();
        config.app.failure_markers.push(String::new());
        assert!(config.validate().is_err());

        let mut config = ConfigFile::default();
        config.app.drain_grace_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("drain_grace_secs"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        assert!(ConfigFile::load(dir.path().join("absent.yaml")).is_err());
    }

    #[test]
    fn test_expand_path() {
        let path = expand_path("./test.yaml");
        assert_eq!(path, PathBuf::from("./test.yaml"));
    }
}
