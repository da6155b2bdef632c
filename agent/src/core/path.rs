//! Helpers for resolving tool paths inside a workspace.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("path '{0}' must be relative to the workspace")]
    Absolute(String),
    #[error("path '{0}' escapes the workspace")]
    Escapes(String),
}

/// Join a model-supplied relative path onto `root`.
///
/// Absolute paths and `..` components are rejected so tools never touch
/// files outside the workspace. `./` prefixes are tolerated.
pub fn workspace_file(root: &Path, relative: &str) -> Result<PathBuf, PathError> {
    let relative = relative.trim();
    if relative.is_empty() {
        return Err(PathError::Empty);
    }
    let candidate = Path::new(relative);
    let mut clean = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(PathError::Escapes(relative.to_string())),
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::Absolute(relative.to_string()));
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(PathError::Empty);
    }
    Ok(root.join(clean))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_relative_paths() {
        let root = Path::new("/ws");
        assert_eq!(
            workspace_file(root, "tests/test_calculator.py"),
            Ok(PathBuf::from("/ws/tests/test_calculator.py"))
        );
        assert_eq!(
            workspace_file(root, "./calculator.py"),
            Ok(PathBuf::from("/ws/calculator.py"))
        );
    }

    #[test]
    fn rejects_escaping_and_absolute_paths() {
        let root = Path::new("/ws");
        assert_eq!(
            workspace_file(root, "../etc/passwd"),
            Err(PathError::Escapes("../etc/passwd".to_string()))
        );
        assert_eq!(
            workspace_file(root, "/etc/passwd"),
            Err(PathError::Absolute("/etc/passwd".to_string()))
        );
        assert_eq!(workspace_file(root, "."), Err(PathError::Empty));
    }
}
