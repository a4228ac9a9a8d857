//! Executor configuration and its file IO.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use stepweave_util::expand_tilde;
use thiserror::Error;
use tracing::debug;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "STEPWEAVE_CONFIG_PATH";
/// Upper bound for `max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// What the executor does after a step fails.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run; the ledger is kept as-is.
    #[default]
    Halt,
    /// Record the failure and move on to the next step.
    Continue,
}

/// Tunables for [`crate::executor::PlanExecutor`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    pub failure_policy: FailurePolicy,
    /// Extra attempts after a failed invocation.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Approval gates time out after this many seconds; `None` waits indefinitely.
    pub approval_timeout_secs: Option<u64>,
    /// Tools that always require approval, in addition to steps flagged in the plan.
    pub confirm_tools: Vec<String>,
    pub busy_poll_interval_ms: u64,
    pub busy_wait_budget_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Halt,
            max_retries: 0,
            retry_delay_ms: 0,
            approval_timeout_secs: None,
            confirm_tools: Vec::new(),
            busy_poll_interval_ms: 100,
            busy_wait_budget_ms: 10_000,
        }
    }
}

impl ExecutorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn approval_timeout(&self) -> Option<Duration> {
        self.approval_timeout_secs.map(Duration::from_secs)
    }

    pub fn busy_poll_interval(&self) -> Duration {
        Duration::from_millis(self.busy_poll_interval_ms)
    }

    pub fn busy_wait_budget(&self) -> Duration {
        Duration::from_millis(self.busy_wait_budget_ms)
    }

    /// Total invocation attempts per step.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    pub fn tool_requires_confirmation(&self, tool_name: &str) -> bool {
        self.confirm_tools.iter().any(|tool| tool == tool_name)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::Invalid {
                field: "max_retries",
                reason: format!("must be at most {MAX_RETRIES_LIMIT}, got {}", self.max_retries),
            });
        }
        if self.busy_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "busy_poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.approval_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "approval_timeout_secs",
                reason: "must be greater than zero when set".to_string(),
            });
        }
        if let Some(blank) = self.confirm_tools.iter().position(|tool| tool.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "confirm_tools",
                reason: format!("entry {blank} is empty"),
            });
        }
        Ok(())
    }
}

/// Failures while loading [`ExecutorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Returns the default path for the executor configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir().unwrap_or_else(|| PathBuf::from(".")).join("stepweave").join("executor.json")
}

/// Loads configuration from the default path.
pub fn load_config() -> Result<ExecutorConfig, ConfigError> {
    load_config_from_path(&default_config_path())
}

/// Loads configuration from `path`. A missing file yields the defaults.
pub fn load_config_from_path(path: &Path) -> Result<ExecutorConfig, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "executor config not found; using defaults");
        return Ok(ExecutorConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ExecutorConfig = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_path_honors_environment_override() {
        let override_path = "~/custom/stepweave/executor.json";
        temp_env::with_var(CONFIG_PATH_ENV, Some(override_path), || {
            assert_eq!(default_config_path(), expand_tilde(override_path));
        });
    }

    #[test]
    fn blank_override_falls_back_to_config_dir() {
        temp_env::with_var(CONFIG_PATH_ENV, Some("  "), || {
            assert!(default_config_path().ends_with("stepweave/executor.json"));
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        let directory = tempfile::tempdir().expect("tempdir");
        let config = load_config_from_path(&directory.path().join("absent.json")).expect("defaults");
        assert_eq!(config, ExecutorConfig::default());
        assert_eq!(config.max_attempts(), 1);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"failure_policy": "continue", "max_retries": 2, "confirm_tools": ["delete_file"]}}"#).expect("write");

        let config = load_config_from_path(file.path()).expect("loads");
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.max_attempts(), 3);
        assert!(config.tool_requires_confirmation("delete_file"));
        assert!(!config.tool_requires_confirmation("search"));
        assert_eq!(config.busy_poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn out_of_range_values_are_invalid() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"max_retries": 11}}"#).expect("write");
        let error = load_config_from_path(file.path()).expect_err("invalid");
        assert!(matches!(error, ConfigError::Invalid { field: "max_retries", .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{ not json").expect("write");
        assert!(matches!(load_config_from_path(file.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"max_retry": 1}}"#).expect("write");
        assert!(matches!(load_config_from_path(file.path()), Err(ConfigError::Parse { .. })));
    }
}
