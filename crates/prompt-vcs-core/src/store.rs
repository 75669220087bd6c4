use crate::lockfile::PROMPTS_DIR;
use crate::{PromptVcsError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One version of a prompt as stored in `prompts/<id>/<version>.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub template: String,
}

/// Storage for versioned prompt templates.
///
/// The codemod only relies on `exists` and `save`; `load` and
/// `list_versions` serve the runtime manager and the CLI.
pub trait TemplateStore {
    fn load(&self, prompt_id: &str, version: &str) -> Result<PromptTemplate>;

    /// Whether the default version of `prompt_id` has been written.
    fn exists(&self, prompt_id: &str) -> bool;

    fn save(
        &mut self,
        prompt_id: &str,
        version: &str,
        content: &str,
        description: &str,
    ) -> Result<()>;

    fn list_versions(&self, prompt_id: &str) -> Result<Vec<String>>;
}

/// YAML files on disk under a `prompts/` directory
#[derive(Debug, Clone)]
pub struct YamlTemplateStore {
    prompts_dir: PathBuf,
    default_version: String,
}

impl YamlTemplateStore {
    /// Store rooted at `<project_root>/prompts`
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(project_root.join(PROMPTS_DIR))
    }

    pub fn new(prompts_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompts_dir: prompts_dir.into(),
            default_version: "v1".to_string(),
        }
    }

    pub fn with_default_version(mut self, version: impl Into<String>) -> Self {
        self.default_version = version.into();
        self
    }

    pub fn prompts_dir(&self) -> &Path {
        &self.prompts_dir
    }

    pub fn default_version(&self) -> &str {
        &self.default_version
    }

    pub fn template_path(&self, prompt_id: &str, version: &str) -> PathBuf {
        self.prompts_dir
            .join(prompt_id)
            .join(format!("{}.yaml", version))
    }

    pub fn version_exists(&self, prompt_id: &str, version: &str) -> bool {
        self.template_path(prompt_id, version).is_file()
    }
}

impl TemplateStore for YamlTemplateStore {
    fn load(&self, prompt_id: &str, version: &str) -> Result<PromptTemplate> {
        let path = self.template_path(prompt_id, version);
        if !path.is_file() {
            return Err(PromptVcsError::VersionNotFound {
                id: prompt_id.to_string(),
                version: version.to_string(),
            });
        }
        let content = std::fs::read_to_string(&path)?;
        let template: PromptTemplate = serde_yaml::from_str(&content)?;
        debug!("Loaded {}", path.display());
        Ok(template)
    }

    fn exists(&self, prompt_id: &str) -> bool {
        self.version_exists(prompt_id, &self.default_version)
    }

    fn save(
        &mut self,
        prompt_id: &str,
        version: &str,
        content: &str,
        description: &str,
    ) -> Result<()> {
        let path = self.template_path(prompt_id, version);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let entry = PromptTemplate {
            version: version.to_string(),
            description: description.to_string(),
            template: content.to_string(),
        };
        std::fs::write(&path, serde_yaml::to_string(&entry)?)?;
        info!("Wrote template {}", path.display());
        Ok(())
    }

    fn list_versions(&self, prompt_id: &str) -> Result<Vec<String>> {
        let dir = self.prompts_dir.join(prompt_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut versions = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    versions.push(stem.to_string());
                }
            }
        }
        versions.sort();
        Ok(versions)
    }
}
