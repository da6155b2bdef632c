//! Scenario catalogue: named corruptions applied to the baseline project.
//!
//! Each scenario is a list of [`SeedEdit`]s plus the metadata shown to users
//! ([`DefectDescriptor`]). Descriptors are display data only; nothing checks
//! the agent's fix against them.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Description of the defect a scenario injects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectDescriptor {
    pub seed: String,
    pub description: String,
    pub categories: Vec<String>,
    pub files: Vec<String>,
    pub lines: Vec<u32>,
    pub expected_fixes: Vec<String>,
}

/// One textual corruption of a workspace file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedEdit {
    /// Replace the first occurrence of `from`, which must be present.
    Replace {
        file: &'static str,
        from: &'static str,
        to: &'static str,
    },
    Append {
        file: &'static str,
        text: &'static str,
    },
    Prepend {
        file: &'static str,
        text: &'static str,
    },
    /// Create (or overwrite) a file.
    Write {
        file: &'static str,
        contents: &'static str,
    },
}

impl SeedEdit {
    pub fn file(&self) -> &'static str {
        match *self {
            Self::Replace { file, .. }
            | Self::Append { file, .. }
            | Self::Prepend { file, .. }
            | Self::Write { file, .. } => file,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub categories: &'static [&'static str],
    pub files: &'static [&'static str],
    pub lines: &'static [u32],
    pub expected_fixes: &'static [&'static str],
    /// Default `max_turns` for runs of this scenario.
    pub turn_budget: u32,
    pub edits: &'static [SeedEdit],
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("unknown scenario '{name}' (known: {known})")]
    Unknown { name: String, known: String },
    #[error("seed pattern not found in {file}: {pattern:?}")]
    PatternMissing {
        file: &'static str,
        pattern: &'static str,
    },
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "seed_00_healthy",
        description: "No defect; the baseline already passes",
        categories: &[],
        files: &[],
        lines: &[],
        expected_fixes: &[],
        turn_budget: 1,
        edits: &[],
    },
    Scenario {
        name: "seed_01_syntax",
        description: "Missing colon in function definition",
        categories: &["SyntaxError"],
        files: &["calculator.py"],
        lines: &[3],
        expected_fixes: &["add_colon"],
        turn_budget: 3,
        edits: &[SeedEdit::Replace {
            file: "calculator.py",
            from: "def add(a, b):",
            to: "def add(a, b)",
        }],
    },
    Scenario {
        name: "seed_02_import",
        description: "Missing math import",
        categories: &["NameError"],
        files: &["calculator.py"],
        lines: &[22],
        expected_fixes: &["add_import:math"],
        turn_budget: 6,
        edits: &[SeedEdit::Append {
            file: "calculator.py",
            text: "\n\ndef sqrt_calc(x):\n    return math.sqrt(x)\n",
        }],
    },
    Scenario {
        name: "seed_03_test",
        description: "Wrong test assertion value",
        categories: &["AssertionError"],
        files: &["tests/test_calculator.py"],
        lines: &[6],
        expected_fixes: &["fix_assertion:5"],
        turn_budget: 2,
        edits: &[SeedEdit::Replace {
            file: "tests/test_calculator.py",
            from: "assert add(2, 3) == 5",
            to: "assert add(2, 3) == 6",
        }],
    },
    Scenario {
        name: "seed_04_dependency",
        description: "Missing numpy dependency",
        categories: &["ModuleNotFoundError"],
        files: &["calculator.py", "requirements.txt"],
        lines: &[1],
        expected_fixes: &["add_dependency:numpy"],
        turn_budget: 4,
        edits: &[SeedEdit::Prepend {
            file: "calculator.py",
            text: "import numpy as np\n\n\ndef array_sum(arr):\n    return np.sum(arr)\n\n\n",
        }],
    },
    Scenario {
        name: "seed_05_yaml",
        description: "Missing colon in YAML config",
        categories: &["YAMLError"],
        files: &["ci/ci_config.yml"],
        lines: &[4],
        expected_fixes: &["add_colon"],
        turn_budget: 3,
        edits: &[SeedEdit::Write {
            file: "ci/ci_config.yml",
            contents: "steps:\n  - name: test\n    run: pytest\n  - name lint\n    run: flake8\n",
        }],
    },
    Scenario {
        name: "seed_06_multi",
        description: "Multiple issues: syntax + test failure",
        categories: &["SyntaxError", "AssertionError"],
        files: &["calculator.py", "tests/test_calculator.py"],
        lines: &[15, 21],
        expected_fixes: &["add_colon", "fix_assertion:5"],
        turn_budget: 8,
        edits: &[
            SeedEdit::Replace {
                file: "calculator.py",
                from: "def divide(a, b):",
                to: "def divide(a, b)",
            },
            SeedEdit::Replace {
                file: "tests/test_calculator.py",
                from: "assert divide(10, 2) == 5",
                to: "assert divide(10, 2) == 4",
            },
        ],
    },
    Scenario {
        name: "seed_lint",
        description: "PEP8 linting error (E302 missing blank lines)",
        categories: &["LintingError"],
        files: &["calculator.py"],
        lines: &[9],
        expected_fixes: &["add_blank_lines"],
        turn_budget: 3,
        edits: &[SeedEdit::Replace {
            file: "calculator.py",
            from: "    return a - b\n\n\ndef multiply",
            to: "    return a - b\ndef multiply",
        }],
    },
    Scenario {
        name: "seed_multi",
        description: "Multiple syntax errors in the same file",
        categories: &["SyntaxError"],
        files: &["calculator.py"],
        lines: &[3, 11, 16],
        expected_fixes: &["add_colon", "add_colon", "add_colon"],
        turn_budget: 6,
        edits: &[
            SeedEdit::Replace {
                file: "calculator.py",
                from: "def add(a, b):",
                to: "def add(a, b)",
            },
            SeedEdit::Replace {
                file: "calculator.py",
                from: "def multiply(a, b):",
                to: "def multiply(a, b)",
            },
            SeedEdit::Replace {
                file: "calculator.py",
                from: "    if b == 0:",
                to: "    if b == 0",
            },
        ],
    },
];

/// Look up a scenario by id.
pub fn find_scenario(name: &str) -> Result<&'static Scenario, ScenarioError> {
    SCENARIOS
        .iter()
        .find(|scenario| scenario.name == name)
        .ok_or_else(|| ScenarioError::Unknown {
            name: name.to_string(),
            known: SCENARIOS
                .iter()
                .map(|scenario| scenario.name)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

impl Scenario {
    pub fn descriptor(&self) -> DefectDescriptor {
        let owned = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        DefectDescriptor {
            seed: self.name.to_string(),
            description: self.description.to_string(),
            categories: owned(self.categories),
            files: owned(self.files),
            lines: self.lines.to_vec(),
            expected_fixes: owned(self.expected_fixes),
        }
    }

    /// Apply every edit to the workspace at `root`.
    pub fn seed(&self, root: &Path) -> Result<()> {
        for edit in self.edits {
            apply_edit(root, edit)?;
        }
        Ok(())
    }
}

fn apply_edit(root: &Path, edit: &SeedEdit) -> Result<()> {
    let path = root.join(edit.file());
    let updated = match *edit {
        SeedEdit::Write { contents, .. } => contents.to_string(),
        SeedEdit::Replace { file, from, to } => {
            let text = read(&path)?;
            if !text.contains(from) {
                return Err(ScenarioError::PatternMissing {
                    file,
                    pattern: from,
                }
                .into());
            }
            text.replacen(from, to, 1)
        }
        SeedEdit::Append { text, .. } => read(&path)? + text,
        SeedEdit::Prepend { text, .. } => format!("{text}{}", read(&path)?),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(&path, updated).with_context(|| format!("write {}", path.display()))
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::write_baseline;

    fn seeded(name: &str) -> tempfile::TempDir {
        let temp = tempfile::tempdir().expect("tempdir");
        write_baseline(temp.path()).expect("baseline");
        find_scenario(name).expect("scenario").seed(temp.path()).expect("seed");
        temp
    }

    fn line(root: &Path, file: &str, number: u32) -> String {
        let text = fs::read_to_string(root.join(file)).expect("read");
        text.lines()
            .nth(number as usize - 1)
            .expect("line in range")
            .to_string()
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = SCENARIOS.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SCENARIOS.len());
    }

    #[test]
    fn every_scenario_seeds_cleanly() {
        for scenario in SCENARIOS {
            let temp = tempfile::tempdir().expect("tempdir");
            write_baseline(temp.path()).expect("baseline");
            scenario
                .seed(temp.path())
                .unwrap_or_else(|err| panic!("{}: {err:#}", scenario.name));
            assert!(scenario.turn_budget > 0);
        }
    }

    #[test]
    fn unknown_scenario_lists_known_ids() {
        let err = find_scenario("seed_99").expect_err("unknown");
        let message = err.to_string();
        assert!(message.contains("seed_99"));
        assert!(message.contains("seed_01_syntax"));
        assert!(message.contains("seed_multi"));
    }

    #[test]
    fn descriptor_lines_point_at_the_defects() {
        let ws = seeded("seed_01_syntax");
        assert_eq!(line(ws.path(), "calculator.py", 3), "def add(a, b)");

        let ws = seeded("seed_02_import");
        assert_eq!(
            line(ws.path(), "calculator.py", 22),
            "    return math.sqrt(x)"
        );

        let ws = seeded("seed_03_test");
        assert_eq!(
            line(ws.path(), "tests/test_calculator.py", 6),
            "    assert add(2, 3) == 6"
        );

        let ws = seeded("seed_05_yaml");
        assert_eq!(line(ws.path(), "ci/ci_config.yml", 4), "  - name lint");

        let ws = seeded("seed_06_multi");
        assert_eq!(line(ws.path(), "calculator.py", 15), "def divide(a, b)");
        assert_eq!(
            line(ws.path(), "tests/test_calculator.py", 21),
            "    assert divide(10, 2) == 4"
        );

        let ws = seeded("seed_lint");
        assert_eq!(line(ws.path(), "calculator.py", 9), "def multiply(a, b):");
        assert_eq!(line(ws.path(), "calculator.py", 8), "    return a - b");

        let ws = seeded("seed_multi");
        assert_eq!(line(ws.path(), "calculator.py", 3), "def add(a, b)");
        assert_eq!(line(ws.path(), "calculator.py", 11), "def multiply(a, b)");
        assert_eq!(line(ws.path(), "calculator.py", 16), "    if b == 0");
    }

    #[test]
    fn missing_pattern_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_baseline(temp.path()).expect("baseline");
        let edit = SeedEdit::Replace {
            file: "calculator.py",
            from: "def power(a, b):",
            to: "def power(a, b)",
        };
        let err = apply_edit(temp.path(), &edit).expect_err("missing pattern");
        assert!(err.to_string().contains("seed pattern not found"));
    }

    #[test]
    fn descriptor_copies_metadata() {
        let descriptor = find_scenario("seed_06_multi").expect("scenario").descriptor();
        assert_eq!(descriptor.seed, "seed_06_multi");
        assert_eq!(
            descriptor.files,
            vec!["calculator.py", "tests/test_calculator.py"]
        );
        assert_eq!(descriptor.lines, vec![15, 21]);
    }
}
