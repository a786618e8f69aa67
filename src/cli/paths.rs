use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Default state directory name under the home directory.
const STATE_DIR_NAME: &str = ".review-assistant";

/// Find the git root directory by searching upward from current directory.
pub fn find_git_root() -> Option<PathBuf> {
    let current = std::env::current_dir().ok()?;
    let mut path = current.as_path();

    loop {
        if path.join(".git").exists() {
            return Some(path.to_path_buf());
        }
        path = path.parent()?;
    }
}

/// Resolve the project root: explicit path, else git root, else current directory.
pub fn resolve_workspace_root(workspace_root: Option<String>) -> Result<PathBuf> {
    if let Some(path) = workspace_root {
        return PathBuf::from(&path)
            .canonicalize()
            .with_context(|| format!("Failed to canonicalize provided workspace root: {}", path));
    }
    match find_git_root() {
        Some(root) => Ok(root),
        None => std::env::current_dir().context("Failed to get current directory"),
    }
}

/// Project name: explicit value, else the root's directory name.
pub fn resolve_project_name(project: Option<String>, root: &Path) -> Result<String> {
    if let Some(name) = project.filter(|name| !name.trim().is_empty()) {
        return Ok(name);
    }
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| {
            format!(
                "Cannot derive a project name from {}; pass --project",
                root.display()
            )
        })
}

/// State directory: explicit path, else `~/.review-assistant`.
pub fn resolve_state_dir(state_dir: Option<String>) -> Result<PathBuf> {
    if let Some(path) = state_dir {
        return Ok(PathBuf::from(path));
    }
    dirs::home_dir()
        .map(|home| home.join(STATE_DIR_NAME))
        .context("Cannot determine home directory; pass --state-dir")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_name_defaults_to_directory_name() {
        let name = resolve_project_name(None, Path::new("/work/my-service")).unwrap();
        assert_eq!(name, "my-service");

        let name = resolve_project_name(Some("api".to_string()), Path::new("/work/x")).unwrap();
        assert_eq!(name, "api");

        assert!(resolve_project_name(None, Path::new("/")).is_err());
    }

    #[test]
    fn test_explicit_state_dir_wins() {
        let dir = resolve_state_dir(Some("/tmp/state".to_string())).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/state"));
    }

    #[test]
    fn test_explicit_workspace_root_is_canonicalized() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let root =
            resolve_workspace_root(Some(temp_dir.path().to_string_lossy().into_owned())).unwrap();
        assert_eq!(root, temp_dir.path().canonicalize().unwrap());

        assert!(resolve_workspace_root(Some("/definitely/not/here".to_string())).is_err());
    }
}
