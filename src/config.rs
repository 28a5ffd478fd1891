//! Configuration
//!
//! Loaded from TOML (`--config` or `<config_dir>/localmcp/config.toml`).
//! A missing file means defaults; CLI flags and `LOCALMCP_*` variables are
//! applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::mcp::DEFAULT_MAX_FRAME_BYTES;
use crate::tasks::TaskSettings;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub command: CommandConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub max_frame_bytes: usize,
    /// Maximum number of finished background tasks kept; unset keeps all
    pub task_retention: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "localmcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            task_retention: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `localmcp=debug`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Json }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub enabled: bool,
    pub default_shell: String,
    pub default_timeout_secs: u64,
    pub max_output_bytes: usize,
    /// Program prefixes allowed to run; empty allows everything not denied
    pub allowed_commands: Vec<String>,
    /// Substrings that reject a command line
    pub denied_commands: Vec<String>,
    pub working_directory: Option<PathBuf>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_shell: "/bin/bash".to_string(),
            default_timeout_secs: 300,
            max_output_bytes: 10 * 1024 * 1024,
            allowed_commands: Vec::new(),
            denied_commands: vec!["rm -rf /".to_string(), "sudo".to_string()],
            working_directory: dirs::home_dir(),
        }
    }
}

impl CommandConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("localmcp").join("config.toml"))
    }

    /// Load `path`, or the default location when `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Config::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn parse(content: &str) -> Result<Config, toml::de::Error> {
        let mut config: Config = toml::from_str(content)?;
        config.command.working_directory = config.command.working_directory.map(|dir| expand_home(&dir));
        Ok(config)
    }

    /// Task manager limits derived from this config
    pub fn task_settings(&self) -> TaskSettings {
        TaskSettings {
            default_timeout: self.command.default_timeout(),
            max_output_bytes: self.command.max_output_bytes,
            retention: self.server.task_retention,
        }
    }
}

/// `~` and `~/...` resolve against the home directory
fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.command.default_shell, "/bin/bash");
        assert_eq!(config.command.default_timeout_secs, 300);
        assert_eq!(config.server.max_frame_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
[server]
task_retention = 50

[logging]
format = "text"

[command]
default_timeout_secs = 10
denied_commands = ["shutdown"]
"#,
        )
        .unwrap();
        assert_eq!(config.server.task_retention, Some(50));
        assert_eq!(config.server.name, "localmcp");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.command.default_timeout(), Duration::from_secs(10));
        assert_eq!(config.command.denied_commands, vec!["shutdown".to_string()]);
        assert_eq!(config.command.max_output_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(Config::parse("[logging]\nformat = \"xml\"\n").is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_tilde_working_directory_expands() {
        let config = Config::parse("[command]\nworking_directory = \"~/work\"\n").unwrap();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(config.command.working_directory, Some(home.join("work")));
        }
    }
}
