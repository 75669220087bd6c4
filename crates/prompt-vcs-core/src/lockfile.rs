// ABOUTME: Lockfile that pins each prompt id to its active version.
// ABOUTME: Also owns project-root discovery shared by the CLI and the runtime manager.
use crate::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const LOCKFILE_NAME: &str = ".prompt_lock.json";
pub const PROMPTS_DIR: &str = "prompts";

/// Prompt id -> pinned version. Ordered so saved files diff cleanly.
pub type Lockfile = BTreeMap<String, String>;

/// Walk up from `start` looking for a lockfile or a `.git` directory.
///
/// Returns `None` once the filesystem root is passed without a match.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(LOCKFILE_NAME).exists() || dir.join(".git").exists() {
            debug!("Project root found at {}", dir.display());
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

/// Like [`find_project_root`] but only accepts a lockfile as the marker.
pub fn find_lockfile_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(LOCKFILE_NAME).exists())
        .map(Path::to_path_buf)
}

/// Read the lockfile under `project_root`. A missing file is an empty lockfile.
pub fn load_lockfile(project_root: &Path) -> Result<Lockfile> {
    let path = project_root.join(LOCKFILE_NAME);
    if !path.exists() {
        return Ok(Lockfile::new());
    }
    let content = std::fs::read_to_string(&path)?;
    if content.trim().is_empty() {
        return Ok(Lockfile::new());
    }
    Ok(serde_json::from_str(&content)?)
}

pub fn save_lockfile(project_root: &Path, lockfile: &Lockfile) -> Result<()> {
    let path = project_root.join(LOCKFILE_NAME);
    let mut content = serde_json::to_string_pretty(lockfile)?;
    content.push('\n');
    std::fs::write(path, content)?;
    Ok(())
}
