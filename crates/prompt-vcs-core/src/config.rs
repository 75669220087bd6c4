use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Name of the per-project config file, looked up in the project root.
pub const CONFIG_FILE_NAME: &str = ".pvcs.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration for prompt-vcs
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptVcsConfig {
    /// Source migration settings
    #[serde(default)]
    pub migration: MigrationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings consumed by the codemod scanner and rewriter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Variable names that mark an assignment as a hardcoded prompt.
    /// Matching is case-sensitive; `<anything>_<name>` also matches.
    #[serde(default = "default_prompt_names")]
    pub prompt_names: Vec<String>,

    /// Literal or template text shorter than this is never migrated
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Module the generated import pulls the accessor from
    #[serde(default = "default_accessor_module")]
    pub accessor_module: String,

    /// Name of the runtime accessor referenced by generated code
    #[serde(default = "default_accessor_name")]
    pub accessor_name: String,

    /// Version written for templates extracted in clean mode
    #[serde(default = "default_version")]
    pub default_version: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            prompt_names: default_prompt_names(),
            min_length: default_min_length(),
            accessor_module: default_accessor_module(),
            accessor_name: default_accessor_name(),
            default_version: default_version(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_prompt_names() -> Vec<String> {
    ["prompt", "template", "instruction", "msg"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_min_length() -> usize {
    10
}
fn default_accessor_module() -> String {
    "prompt_vcs".to_string()
}
fn default_accessor_name() -> String {
    "p".to_string()
}
fn default_version() -> String {
    "v1".to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration manager with layered lookup
pub struct ConfigManager {
    config: PromptVcsConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables
    /// 2. Explicit config file, if given
    /// 3. `<project_root>/.pvcs.toml`
    /// 4. `~/.prompt-vcs/config.toml`
    /// 5. Defaults
    pub fn load(
        project_root: Option<&Path>,
        explicit: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let (config, config_path) = Self::load_config_file(project_root, explicit)?;
        let config = Self::apply_env_overrides(config);
        Self::validate_config(&config)?;

        match &config_path {
            Some(path) => info!("Loaded configuration from {}", path.display()),
            None => debug!("No config file found, using defaults"),
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    fn load_config_file(
        project_root: Option<&Path>,
        explicit: Option<&Path>,
    ) -> Result<(PromptVcsConfig, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            let config = Self::read_toml_file(path)?;
            return Ok((config, Some(path.to_path_buf())));
        }

        if let Some(root) = project_root {
            let local_config = root.join(CONFIG_FILE_NAME);
            if local_config.exists() {
                let config = Self::read_toml_file(&local_config)?;
                return Ok((config, Some(local_config)));
            }
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".prompt-vcs").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((PromptVcsConfig::default(), None))
    }

    fn read_toml_file(path: &Path) -> Result<PromptVcsConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_env_overrides(mut config: PromptVcsConfig) -> PromptVcsConfig {
        if let Ok(level) = std::env::var("PVCS_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("PVCS_LOG_FORMAT") {
            config.logging.format = format;
        }
        if let Ok(min_length) = std::env::var("PVCS_MIN_LENGTH") {
            if let Ok(n) = min_length.parse() {
                config.migration.min_length = n;
            }
        }
        if let Ok(names) = std::env::var("PVCS_PROMPT_NAMES") {
            config.migration.prompt_names = names
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        config
    }

    fn validate_config(config: &PromptVcsConfig) -> Result<(), ConfigError> {
        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    other
                )))
            }
        }

        match config.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, compact, json",
                    other
                )))
            }
        }

        if config.migration.prompt_names.is_empty() {
            return Err(ConfigError::ValidationError(
                "migration.prompt_names must not be empty".to_string(),
            ));
        }

        for name in [
            &config.migration.accessor_name,
            &config.migration.accessor_module,
        ] {
            let valid = !name.is_empty()
                && !name.starts_with(|c: char| c.is_ascii_digit())
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
            if !valid {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid accessor path component: {:?}",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &PromptVcsConfig {
        &self.config
    }

    /// Get the path to the config file that was loaded, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = PromptVcsConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}
