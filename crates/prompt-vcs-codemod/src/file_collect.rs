use crate::language::is_python_path;
use ignore::{overrides::OverrideBuilder, WalkBuilder};
use prompt_vcs_core::{PromptVcsError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directories never scanned for Python sources
const DEFAULT_EXCLUDES: &[&str] = &[
    "!**/.git/**",
    "!**/__pycache__/**",
    "!**/.venv/**",
    "!**/venv/**",
    "!**/node_modules/**",
    "!**/build/**",
    "!**/dist/**",
    "!**/.pytest_cache/**",
];

/// Collect the Python files under `path`, sorted.
///
/// A file path is returned as-is when it has a Python extension and rejected
/// otherwise. Directories are walked recursively honoring `.gitignore`.
pub fn collect_python_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        if is_python_path(path) {
            return Ok(vec![path.to_path_buf()]);
        }
        return Err(PromptVcsError::InvalidOperation(format!(
            "{} is not a Python file",
            path.display()
        )));
    }
    if !path.is_dir() {
        return Err(PromptVcsError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )));
    }

    info!("Collecting Python files from: {:?}", path);
    let mut ovr = OverrideBuilder::new(path);
    for exclude in DEFAULT_EXCLUDES {
        ovr.add(exclude)
            .map_err(|e| PromptVcsError::InvalidOperation(e.to_string()))?;
    }
    let overrides = ovr
        .build()
        .map_err(|e| PromptVcsError::InvalidOperation(e.to_string()))?;

    let walker = WalkBuilder::new(path)
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .ignore(true)
        .overrides(overrides)
        .build();

    let mut files = Vec::new();
    for dent in walker {
        let dent = match dent {
            Ok(d) => d,
            Err(e) => {
                warn!("Walker error: {}", e);
                continue;
            }
        };
        let file = dent.path();
        if file.is_file() && is_python_path(file) {
            debug!("Found {}", file.display());
            files.push(file.to_path_buf());
        }
    }
    files.sort();

    info!("File collection complete: {} Python files", files.len());
    Ok(files)
}
