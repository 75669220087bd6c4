// ABOUTME: Runtime accessor that resolves prompt ids against the lockfile and template store.
// ABOUTME: Exposes the process-wide manager plus the `p` and `prompt` entry points.
use crate::lockfile::{self, Lockfile};
use crate::render::{render, Vars};
use crate::store::{TemplateStore, YamlTemplateStore};
use crate::{PromptVcsError, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A prompt known to the process before any lockfile lookup
#[derive(Debug, Clone, PartialEq)]
pub struct PromptDefinition {
    pub id: String,
    pub default_content: String,
    pub source_file: Option<String>,
    pub line_number: Option<usize>,
}

impl PromptDefinition {
    pub fn new(id: impl Into<String>, default_content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            default_content: default_content.into(),
            source_file: None,
            line_number: None,
        }
    }

    pub fn with_source(mut self, file: impl Into<String>, line: usize) -> Self {
        self.source_file = Some(file.into());
        self.line_number = Some(line);
        self
    }
}

#[derive(Debug, Default)]
pub struct PromptManager {
    project_root: Option<PathBuf>,
    lockfile: Option<Lockfile>,
    registry: HashMap<String, PromptDefinition>,
}

impl PromptManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_project_root(&mut self, root: impl Into<PathBuf>) {
        self.project_root = Some(root.into());
        self.lockfile = None;
    }

    /// Explicit root, else discovered from the current directory.
    pub fn project_root(&mut self) -> Option<&Path> {
        if self.project_root.is_none() {
            let cwd = std::env::current_dir().ok()?;
            self.project_root = self.find_project_root(&cwd);
        }
        self.project_root.as_deref()
    }

    pub fn find_project_root(&self, start: &Path) -> Option<PathBuf> {
        lockfile::find_project_root(start)
    }

    /// Lockfile contents, cached after the first read.
    pub fn load_lockfile(&mut self) -> Result<Lockfile> {
        if let Some(lock) = &self.lockfile {
            return Ok(lock.clone());
        }
        let lock = match self.project_root() {
            Some(root) => lockfile::load_lockfile(root)?,
            None => Lockfile::new(),
        };
        self.lockfile = Some(lock.clone());
        Ok(lock)
    }

    pub fn save_lockfile(&mut self, lock: &Lockfile) -> Result<()> {
        let root = self
            .project_root()
            .ok_or_else(|| {
                PromptVcsError::InvalidOperation("no project root to save the lockfile in".into())
            })?
            .to_path_buf();
        lockfile::save_lockfile(&root, lock)?;
        self.lockfile = Some(lock.clone());
        Ok(())
    }

    pub fn register_prompt(&mut self, definition: PromptDefinition) {
        debug!("Registered prompt '{}'", definition.id);
        self.registry.insert(definition.id.clone(), definition);
    }

    pub fn registered(&self, id: &str) -> Option<&PromptDefinition> {
        self.registry.get(id)
    }

    /// Resolve and render a prompt.
    ///
    /// A version pinned in the lockfile wins when its file loads; otherwise
    /// `default` is used, then the registered default content.
    pub fn get_prompt(&mut self, id: &str, default: Option<&str>, vars: &Vars) -> Result<String> {
        self.get_prompt_versioned(id, default, None, vars)
    }

    /// Like [`get_prompt`](Self::get_prompt), but an unlocked prompt first
    /// tries `fallback_version` from the template store before `default`.
    pub fn get_prompt_versioned(
        &mut self,
        id: &str,
        default: Option<&str>,
        fallback_version: Option<&str>,
        vars: &Vars,
    ) -> Result<String> {
        if let Some(template) = self.locked_template(id)? {
            return Ok(render(&template, vars));
        }

        if let (Some(version), Some(root)) = (fallback_version, self.project_root()) {
            let store = YamlTemplateStore::for_project(root);
            if store.version_exists(id, version) {
                return Ok(render(&store.load(id, version)?.template, vars));
            }
        }

        let content = match default {
            Some(content) => content.to_string(),
            None => self
                .registry
                .get(id)
                .map(|d| d.default_content.clone())
                .ok_or_else(|| PromptVcsError::PromptNotFound(id.to_string()))?,
        };
        Ok(render(&content, vars))
    }

    fn locked_template(&mut self, id: &str) -> Result<Option<String>> {
        let lock = self.load_lockfile()?;
        let Some(version) = lock.get(id) else {
            return Ok(None);
        };
        let Some(root) = self.project_root() else {
            return Ok(None);
        };
        let store = YamlTemplateStore::for_project(root);
        match store.load(id, version) {
            Ok(entry) => Ok(Some(entry.template)),
            Err(PromptVcsError::VersionNotFound { .. }) => {
                warn!(
                    "Prompt '{}' is locked to {} but the file is missing, using default",
                    id, version
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

static MANAGER: Lazy<RwLock<PromptManager>> = Lazy::new(|| RwLock::new(PromptManager::new()));

/// The process-wide manager used by [`p`] and [`BoundPrompt`].
pub fn get_manager() -> &'static RwLock<PromptManager> {
    &MANAGER
}

/// Drop all cached state of the process-wide manager.
pub fn reset_manager() {
    *MANAGER.write() = PromptManager::new();
}

/// Render prompt `id`, falling back to `default` when it is not locked.
pub fn p(id: &str, default: &str, vars: &Vars) -> Result<String> {
    MANAGER.write().get_prompt(id, Some(default), vars)
}

/// A template bound to a prompt id at definition time and rendered on call.
#[derive(Debug, Clone)]
pub struct BoundPrompt {
    id: String,
    template: String,
    default_version: Option<String>,
}

/// Register `template` under `id` and return a handle that renders it lazily.
pub fn prompt(id: impl Into<String>, template: impl Into<String>) -> BoundPrompt {
    let bound = BoundPrompt {
        id: id.into(),
        template: dedent(&template.into()),
        default_version: None,
    };
    MANAGER
        .write()
        .register_prompt(PromptDefinition::new(&bound.id, &bound.template));
    bound
}

impl BoundPrompt {
    pub fn with_default_version(mut self, version: impl Into<String>) -> Self {
        self.default_version = Some(version.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn default_version(&self) -> Option<&str> {
        self.default_version.as_deref()
    }

    pub fn call(&self, vars: &Vars) -> Result<String> {
        MANAGER.write().get_prompt_versioned(
            &self.id,
            Some(&self.template),
            self.default_version.as_deref(),
            vars,
        )
    }
}

/// Strip common leading indentation and surrounding blank lines, so
/// indented multi-line template text renders flush left.
pub fn dedent(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    let body: Vec<&str> = lines
        .iter()
        .map(|l| l.get(indent..).unwrap_or_else(|| l.trim_start()))
        .collect();
    body.join("\n").trim_matches('\n').trim_end().to_string()
}
