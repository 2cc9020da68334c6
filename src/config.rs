// Configuration File Support
//
// TOML configuration for the conformance harness, with environment variable
// overrides. The file is optional: a missing file yields defaults, and CLI
// flags are applied on top by the caller.

use crate::harness::{Fixtures, RunnerOptions};
use crate::mcp::{ClientInfo, ClientOptions, ServerCommand};
use crate::suites::SUITE_NAMES;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "MCP_HARNESS_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Server under test
    pub server: ServerConfig,

    /// Handshake identification
    pub client: ClientConfig,

    /// Deadlines
    pub timeouts: TimeoutConfig,

    /// Suite selection
    pub run: RunConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// How to launch the server under test
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Executable (e.g. "node"); required to run
    pub command: String,

    /// Arguments for the server
    pub args: Vec<String>,

    /// Working directory of the server
    pub cwd: Option<PathBuf>,

    /// Project directory handed to tests (default: `cwd`, then ".")
    pub project_root: Option<PathBuf>,
}

/// Client identification sent in the handshake
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub name: String,
    pub version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let info = ClientInfo::default();
        Self {
            name: info.name,
            version: info.version,
        }
    }
}

/// Timeouts configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for each response
    pub request_secs: u64,

    /// Deadline for each test body
    pub test_secs: u64,

    /// Pause after the handshake
    pub settle_ms: u64,

    /// Grace period before the server is killed
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            test_secs: 120,
            settle_ms: 1000,
            shutdown_grace_secs: 5,
        }
    }
}

/// Which suites to run, in order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub suites: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            suites: SUITE_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from `$MCP_HARNESS_CONFIG` when `None`
    ///
    /// Without either, defaults plus environment overrides are returned.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        match path.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load_from_path(path),
            None => Ok(Self::default().apply_env_overrides()),
        }
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default().apply_env_overrides());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file from {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file from {:?}", path))?;

        // Apply environment variable overrides
        let config = config.apply_env_overrides();

        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - MCP_HARNESS_LOG_LEVEL
    /// - MCP_HARNESS_LOG_FORMAT
    /// - MCP_HARNESS_SERVER_COMMAND
    /// - MCP_HARNESS_REQUEST_TIMEOUT_SECS
    /// - MCP_HARNESS_TEST_TIMEOUT_SECS
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("MCP_HARNESS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("MCP_HARNESS_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(command) = std::env::var("MCP_HARNESS_SERVER_COMMAND") {
            self.server.command = command;
        }
        if let Ok(secs) = std::env::var("MCP_HARNESS_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                if secs > 0 {
                    self.timeouts.request_secs = secs;
                }
            }
        }
        if let Ok(secs) = std::env::var("MCP_HARNESS_TEST_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                if secs > 0 {
                    self.timeouts.test_secs = secs;
                }
            }
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        // Validate logging format
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if self.server.command.trim().is_empty() {
            anyhow::bail!("No server command configured (use --command or [server] command)");
        }

        if self.client.name.is_empty() || self.client.version.is_empty() {
            anyhow::bail!("Client name and version must not be empty");
        }

        if self.timeouts.request_secs == 0 {
            anyhow::bail!("Request timeout must be > 0");
        }
        if self.timeouts.test_secs == 0 {
            anyhow::bail!("Test timeout must be > 0");
        }
        if self.timeouts.shutdown_grace_secs == 0 {
            anyhow::bail!("Shutdown grace period must be > 0");
        }

        if self.run.suites.is_empty() {
            anyhow::bail!("No suites selected");
        }
        for suite in &self.run.suites {
            if !SUITE_NAMES.contains(&suite.as_str()) {
                anyhow::bail!(
                    "Unknown suite: {}. Must be one of: {}",
                    suite,
                    SUITE_NAMES.join(", ")
                );
            }
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }

    pub fn server_command(&self) -> ServerCommand {
        let mut command = ServerCommand::new(&self.server.command).args(&self.server.args);
        if let Some(cwd) = &self.server.cwd {
            command = command.current_dir(cwd);
        }
        command
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            client_info: ClientInfo {
                name: self.client.name.clone(),
                version: self.client.version.clone(),
            },
            request_timeout: Duration::from_secs(self.timeouts.request_secs),
            ..ClientOptions::default()
        }
    }

    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            test_timeout: Duration::from_secs(self.timeouts.test_secs),
            settle: Duration::from_millis(self.timeouts.settle_ms),
            shutdown_grace: Duration::from_secs(self.timeouts.shutdown_grace_secs),
        }
    }

    pub fn fixtures(&self) -> Fixtures {
        let root = self
            .server
            .project_root
            .clone()
            .or_else(|| self.server.cwd.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        Fixtures::new(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    const ENV_VARS: [&str; 6] = [
        CONFIG_ENV,
        "MCP_HARNESS_LOG_LEVEL",
        "MCP_HARNESS_LOG_FORMAT",
        "MCP_HARNESS_SERVER_COMMAND",
        "MCP_HARNESS_REQUEST_TIMEOUT_SECS",
        "MCP_HARNESS_TEST_TIMEOUT_SECS",
    ];

    // Environment is process-global; tests touching it hold this lock.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn clean_env() -> std::sync::MutexGuard<'static, ()> {
        let guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
        guard
    }

    fn runnable() -> Config {
        let mut config = Config::default();
        config.server.command = "node".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "compact");
        assert_eq!(config.client.name, "mcp-test-client");
        assert_eq!(config.client.version, "1.0.0");
        assert_eq!(config.timeouts.request_secs, 30);
        assert_eq!(config.timeouts.test_secs, 120);
        assert_eq!(config.timeouts.settle_ms, 1000);
        assert_eq!(config.timeouts.shutdown_grace_secs, 5);
        assert_eq!(
            config.run.suites,
            vec!["smoke", "stress", "edge-cases", "battle-prep", "performance"]
        );
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(runnable().validate().is_ok());
    }

    #[test]
    fn test_config_validation_requires_command() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("No server command"));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = runnable();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = runnable();
        config.logging.format = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeouts() {
        let mut config = runnable();
        config.timeouts.request_secs = 0;
        assert!(config.validate().is_err());

        let mut config = runnable();
        config.timeouts.test_secs = 0;
        assert!(config.validate().is_err());

        let mut config = runnable();
        config.timeouts.shutdown_grace_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_settle_may_be_zero() {
        let mut config = runnable();
        config.timeouts.settle_ms = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_unknown_suite() {
        let mut config = runnable();
        config.run.suites = vec!["smoke".to_string(), "fuzz".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Unknown suite: fuzz"));

        config.run.suites.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let _env = clean_env();
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("nonexistent");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_valid_toml_config() {
        let _env = clean_env();

        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging]
level = "debug"
format = "json"

[server]
command = "node"
args = ["dist/index.js"]
cwd = "/srv/decompiler"

[client]
name = "ci-client"
version = "2.0"

[timeouts]
request_secs = 10
test_secs = 60
settle_ms = 0

[run]
suites = ["smoke", "performance"]
"#;

        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.server.command, "node");
        assert_eq!(config.server.args, vec!["dist/index.js"]);
        assert_eq!(config.client.name, "ci-client");
        assert_eq!(config.timeouts.request_secs, 10);
        assert_eq!(config.timeouts.shutdown_grace_secs, 5);
        assert_eq!(config.run.suites, vec!["smoke", "performance"]);
        assert!(config.validate().is_ok());

        let command = config.server_command();
        assert_eq!(command.display(), "node dist/index.js");
        assert_eq!(command.cwd, Some(PathBuf::from("/srv/decompiler")));

        // project_root falls back to cwd
        assert_eq!(config.fixtures().project_path(), "/srv/decompiler");

        let options = config.client_options();
        assert_eq!(options.client_info.name, "ci-client");
        assert_eq!(options.request_timeout, Duration::from_secs(10));

        let runner = config.runner_options();
        assert_eq!(runner.test_timeout, Duration::from_secs(60));
        assert_eq!(runner.settle, Duration::ZERO);
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let _env = clean_env();
        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging
level = "debug"
"#; // Invalid TOML

        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path());
        assert!(config.is_err());
    }

    #[test]
    fn test_load_uses_config_env_var() {
        let _env = clean_env();
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[server]\ncommand = \"java\"\n").unwrap();

        std::env::set_var(CONFIG_ENV, temp_file.path());
        let config = Config::load(None).unwrap();
        std::env::remove_var(CONFIG_ENV);

        assert_eq!(config.server.command, "java");
    }

    #[test]
    fn test_env_overrides() {
        let _env = clean_env();

        std::env::set_var("MCP_HARNESS_LOG_LEVEL", "debug");
        std::env::set_var("MCP_HARNESS_LOG_FORMAT", "json");
        std::env::set_var("MCP_HARNESS_SERVER_COMMAND", "python3");
        std::env::set_var("MCP_HARNESS_REQUEST_TIMEOUT_SECS", "7");
        std::env::set_var("MCP_HARNESS_TEST_TIMEOUT_SECS", "9");

        let config = Config::default().apply_env_overrides();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.server.command, "python3");
        assert_eq!(config.timeouts.request_secs, 7);
        assert_eq!(config.timeouts.test_secs, 9);

        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_env_overrides_invalid_values() {
        let _env = clean_env();

        std::env::set_var("MCP_HARNESS_REQUEST_TIMEOUT_SECS", "0");
        std::env::set_var("MCP_HARNESS_TEST_TIMEOUT_SECS", "soon");

        let config = Config::default().apply_env_overrides();

        // Should keep defaults for invalid values
        assert_eq!(config.timeouts.request_secs, 30);
        assert_eq!(config.timeouts.test_secs, 120);

        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_project_root_precedence() {
        let mut config = runnable();
        assert_eq!(config.fixtures().project_path(), ".");

        config.server.cwd = Some(PathBuf::from("/work"));
        assert_eq!(config.fixtures().project_path(), "/work");

        config.server.project_root = Some(PathBuf::from("/fixtures/spring-app"));
        assert_eq!(config.fixtures().project_path(), "/fixtures/spring-app");
    }

    #[test]
    fn test_log_level_parsing() {
        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::DEBUG);

        config.logging.level = "WARN".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::WARN);

        config.logging.level = "invalid".to_string();
        assert!(config.log_level().is_err());
    }

    #[test]
    fn test_valid_log_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let mut config = runnable();
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "Log level {} should be valid", level);
        }
    }
}
