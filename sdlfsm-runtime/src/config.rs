//! Runtime configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via SDLFSM_CONFIG or --config)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Timer scheduling.
    pub scheduler: SchedulerConfig,
    /// Process hosting.
    pub manager: ManagerConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

impl RuntimeConfig {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("SDLFSM_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: RuntimeConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Applies environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.scheduler.apply_env_overrides();
        self.manager.apply_env_overrides();
        self.logging.apply_env_overrides();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.max_delay_secs == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.max_delay_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }
}

/// Timer scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Longest accepted timer delay in seconds. Longer delays fail to schedule.
    pub max_delay_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_delay_secs: 86_400,
        }
    }
}

impl SchedulerConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(secs) = std::env::var("SDLFSM_MAX_TIMER_DELAY_SECS") {
            if let Ok(n) = secs.parse() {
                self.max_delay_secs = n;
            }
        }
    }

    /// Returns the maximum delay as Duration.
    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

/// Process manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Maximum number of hosted processes (0 = unlimited).
    pub max_processes: usize,
    /// Destroy a process whose graph raised a syntax error.
    pub destroy_on_error: bool,
    /// Drop finished processes from the manager.
    pub remove_finished: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_processes: 0,
            destroy_on_error: true,
            remove_finished: true,
        }
    }
}

impl ManagerConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(max) = std::env::var("SDLFSM_MAX_PROCESSES") {
            if let Ok(n) = max.parse() {
                self.max_processes = n;
            }
        }

        if let Ok(v) = std::env::var("SDLFSM_DESTROY_ON_ERROR") {
            self.destroy_on_error = parse_flag(&v);
        }

        if let Ok(v) = std::env::var("SDLFSM_REMOVE_FINISHED") {
            self.remove_finished = parse_flag(&v);
        }
    }

    /// Returns whether the process count is unbounded.
    pub fn is_unlimited(&self) -> bool {
        self.max_processes == 0
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, used when RUST_LOG is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(filter) = std::env::var("SDLFSM_LOG") {
            if !filter.is_empty() {
                self.filter = filter;
            }
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
