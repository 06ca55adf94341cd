//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Delve executable settings
    #[serde(default)]
    pub dlv: DlvConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Load limits sent with every expression evaluation
    #[serde(default)]
    pub eval: EvalConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Delve executable configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct DlvConfig {
    /// Path to the dlv executable, searched in PATH when unset
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Extra flags appended after the headless flags
    #[serde(default)]
    pub args: Vec<String>,
}

/// Timeout settings
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Timeout for establishing the TCP connection
    #[serde(default = "default_connect")]
    pub connect_secs: u64,

    /// How many times the log file is scanned for the listen banner
    #[serde(default = "default_poll_attempts")]
    pub listen_poll_attempts: u32,

    /// Delay between two scans of the log file
    #[serde(default = "default_poll_interval")]
    pub listen_poll_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect_secs: default_connect(),
            listen_poll_attempts: default_poll_attempts(),
            listen_poll_interval_ms: default_poll_interval(),
        }
    }
}

impl Timeouts {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn listen_poll_interval(&self) -> Duration {
        Duration::from_millis(self.listen_poll_interval_ms)
    }
}

fn default_connect() -> u64 {
    10
}
fn default_poll_attempts() -> u32 {
    5
}
fn default_poll_interval() -> u64 {
    500
}

/// Variable load limits, mirrored onto delve's `LoadConfig`
#[derive(Debug, Deserialize, Clone)]
pub struct EvalConfig {
    #[serde(default = "default_true")]
    pub follow_pointers: bool,

    #[serde(default = "default_recurse")]
    pub max_variable_recurse: i64,

    #[serde(default = "default_max_len")]
    pub max_string_len: i64,

    #[serde(default = "default_max_len")]
    pub max_array_values: i64,

    /// -1 loads every field
    #[serde(default = "default_struct_fields")]
    pub max_struct_fields: i64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            follow_pointers: default_true(),
            max_variable_recurse: default_recurse(),
            max_string_len: default_max_len(),
            max_array_values: default_max_len(),
            max_struct_fields: default_struct_fields(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_recurse() -> i64 {
    1
}
fn default_max_len() -> i64 {
    64
}
fn default_struct_fields() -> i64 {
    -1
}

/// Logging configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct LoggingConfig {
    /// Also write logs to `<data_dir>/logs/dlvctl.log`
    #[serde(default)]
    pub file: bool,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.timeouts.connect_secs == 0 {
            return Err(super::Error::Config(
                "timeouts.connect_secs must be at least 1".to_string(),
            ));
        }
        if self.timeouts.listen_poll_attempts == 0 {
            return Err(super::Error::Config(
                "timeouts.listen_poll_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the dlv executable
    ///
    /// Falls back to searching PATH if not explicitly configured
    pub fn dlv_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.dlv.path {
            return Some(path.clone());
        }
        which::which("dlv").ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.timeouts.connect_secs, 10);
        assert_eq!(config.timeouts.listen_poll_attempts, 5);
        assert_eq!(config.timeouts.listen_poll_interval_ms, 500);
        assert!(config.eval.follow_pointers);
        assert_eq!(config.eval.max_struct_fields, -1);
        assert!(!config.logging.file);
    }

    #[test]
    fn test_partial_config() {
        let config = Config::parse(
            r#"
[dlv]
path = "/opt/go/bin/dlv"
args = ["--check-go-version=false"]

[eval]
max_string_len = 256
"#,
        )
        .unwrap();
        assert_eq!(config.dlv_path(), Some(PathBuf::from("/opt/go/bin/dlv")));
        assert_eq!(config.dlv.args, vec!["--check-go-version=false"]);
        assert_eq!(config.eval.max_string_len, 256);
        assert_eq!(config.eval.max_array_values, 64);
    }

    #[test]
    fn test_invalid_config() {
        let err = Config::parse("[timeouts]\nconnect_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, super::super::Error::ConfigParse(_)));
    }

    #[test]
    fn test_zero_poll_attempts_rejected() {
        let err = Config::parse("[timeouts]\nlisten_poll_attempts = 0").unwrap_err();
        assert!(matches!(err, super::super::Error::Config(_)));
    }
}
