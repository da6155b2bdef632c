//! Baseline project every scenario workspace starts from.
//!
//! The files are compiled into the binary so provisioning never depends on
//! the current directory.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// `(relative path, contents)` of every baseline file.
pub const BASELINE_FILES: &[(&str, &str)] = &[
    ("calculator.py", include_str!("../baseline/calculator.py")),
    (
        "tests/test_calculator.py",
        include_str!("../baseline/tests/test_calculator.py"),
    ),
    ("requirements.txt", include_str!("../baseline/requirements.txt")),
    ("ci_pipeline.py", include_str!("../baseline/ci_pipeline.py")),
];

/// Write the baseline project into `root`, creating directories as needed.
pub fn write_baseline(root: &Path) -> Result<()> {
    for (relative, contents) in BASELINE_FILES {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_every_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_baseline(temp.path()).expect("baseline");
        for (relative, contents) in BASELINE_FILES {
            let written = fs::read_to_string(temp.path().join(relative)).expect("read");
            assert_eq!(&written, contents);
        }
    }

    #[test]
    fn add_is_defined_on_line_three() {
        let (_, calculator) = BASELINE_FILES[0];
        assert_eq!(calculator.lines().nth(2), Some("def add(a, b):"));
    }
}
