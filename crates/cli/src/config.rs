//! Configuration loading: TOML file with environment variable overrides.
//!
//! Reads `automation-runner.toml` (or the path given on the command line).
//! Every field has a default so the file is optional. Environment variables
//! take precedence over file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use engine::RunnerConfig;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub runner: RunnerSection,
    pub storage: StorageSection,
    pub database: DatabaseSection,
    pub logging: LoggingSection,
}

/// Runner tuning.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerSection {
    /// Per-run event channel capacity.
    pub event_buffer: usize,
    /// Progress flush interval in milliseconds.
    pub flush_interval_ms: u64,
}

/// Where simulated runs write their artifacts.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub output_dir: PathBuf,
}

/// Postgres settings. An empty URL keeps run records in memory.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `path` (if present), then apply environment
    /// overrides.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting values are invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("AUTOMATION_RUNNER_EVENT_BUFFER") {
            if let Ok(n) = val.parse() {
                self.runner.event_buffer = n;
            }
        }
        if let Some(val) = var("AUTOMATION_RUNNER_FLUSH_INTERVAL_MS") {
            if let Ok(ms) = val.parse() {
                self.runner.flush_interval_ms = ms;
            }
        }
        if let Some(val) = var("AUTOMATION_RUNNER_OUTPUT_DIR") {
            self.storage.output_dir = PathBuf::from(val);
        }
        if let Some(val) = var("AUTOMATION_RUNNER_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = var("DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = var("AUTOMATION_RUNNER_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.runner.event_buffer == 0 {
            return Err(ConfigError::Validation(
                "runner.event_buffer must be non-zero".to_string(),
            ));
        }
        if self.runner.flush_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "runner.flush_interval_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            event_buffer: self.runner.event_buffer,
            flush_interval: Duration::from_millis(self.runner.flush_interval_ms),
        }
    }

    /// The configured database URL, if any.
    #[must_use]
    pub fn database_url(&self) -> Option<&str> {
        Some(self.database.url.as_str()).filter(|url| !url.is_empty())
    }
}

impl Default for RunnerSection {
    fn default() -> Self {
        let defaults = RunnerConfig::default();
        Self {
            event_buffer: defaults.event_buffer,
            flush_interval_ms: u64::try_from(defaults.flush_interval.as_millis())
                .unwrap_or(u64::MAX),
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("automation-output"),
        }
    }
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "automation_runner=info,engine=info,actions=info,db=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.runner.event_buffer, 1000);
        assert_eq!(config.runner.flush_interval_ms, 2000);
        assert_eq!(config.storage.output_dir, PathBuf::from("automation-output"));
        assert_eq!(config.database_url(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [runner]
            event_buffer = 64
            flush_interval_ms = 500

            [storage]
            output_dir = '/tmp/shots'

            [database]
            url = 'postgres://localhost/runs'
            max_connections = 2

            [logging]
            filter = 'debug'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        let runner = config.runner_config();
        assert_eq!(runner.event_buffer, 64);
        assert_eq!(runner.flush_interval, Duration::from_millis(500));
        assert_eq!(config.storage.output_dir, PathBuf::from("/tmp/shots"));
        assert_eq!(config.database_url(), Some("postgres://localhost/runs"));
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file(Path::new("nonexistent-automation-runner.toml")).unwrap();
        assert_eq!(config.runner.event_buffer, 1000);
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AUTOMATION_RUNNER_EVENT_BUFFER", "10"),
            ("AUTOMATION_RUNNER_FLUSH_INTERVAL_MS", "not-a-number"),
            ("AUTOMATION_RUNNER_OUTPUT_DIR", "/var/shots"),
            ("AUTOMATION_RUNNER_DATABASE_URL", "postgres://a/runs"),
            ("DATABASE_URL", "postgres://b/runs"),
            ("RUST_LOG", "trace"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.runner.event_buffer, 10);
        assert_eq!(config.runner.flush_interval_ms, 2000, "unparsable values are ignored");
        assert_eq!(config.storage.output_dir, PathBuf::from("/var/shots"));
        assert_eq!(config.database_url(), Some("postgres://b/runs"));
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_reject_zero_buffer() {
        let mut config = Config::default();
        config.runner.event_buffer = 0;
        assert!(config.validate().is_err());
    }
}
