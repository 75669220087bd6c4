pub mod config;
pub mod error;
pub mod lockfile;
pub mod manager;
pub mod render;
pub mod store;

pub use config::{ConfigError, ConfigManager, LoggingConfig, MigrationConfig, PromptVcsConfig};
pub use error::*;
pub use lockfile::{
    find_lockfile_root, find_project_root, load_lockfile, save_lockfile, Lockfile,
    LOCKFILE_NAME, PROMPTS_DIR,
};
pub use manager::{
    get_manager, p, prompt, reset_manager, BoundPrompt, PromptDefinition, PromptManager,
};
pub use render::{render, Vars};
pub use store::{PromptTemplate, TemplateStore, YamlTemplateStore};
