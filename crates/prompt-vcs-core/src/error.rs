use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptVcsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    #[error("Version {version} of prompt '{id}' not found")]
    VersionNotFound { id: String, version: String },

    #[error("Prompt ID conflict: {0}")]
    IdConflict(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type Result<T> = std::result::Result<T, PromptVcsError>;
