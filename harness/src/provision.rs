//! Workspace provisioning: baseline copy plus one scenario seed.
//!
//! Each scenario gets `workspaces/test_<scenario>`; an existing directory of
//! that name is removed first, so runs never share state.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::baseline::write_baseline;
use crate::scenarios::{DefectDescriptor, Scenario, find_scenario};

/// A freshly seeded workspace.
#[derive(Debug, Clone)]
pub struct ProvisionedWorkspace {
    pub scenario: &'static Scenario,
    /// Absolute path to the workspace root.
    pub root: PathBuf,
    pub descriptor: DefectDescriptor,
    /// SHA-256 over the seeded files, for comparing runs.
    pub digest: String,
}

pub fn workspace_dir(base_dir: &Path, scenario: &str) -> PathBuf {
    base_dir.join(format!("test_{scenario}"))
}

/// Create the workspace for `scenario` under `base_dir`.
#[instrument(skip_all, fields(scenario = %scenario))]
pub fn provision(base_dir: &Path, scenario: &str) -> Result<ProvisionedWorkspace> {
    let scenario = find_scenario(scenario)?;
    let root = workspace_dir(base_dir, scenario.name);
    if root.exists() {
        debug!(root = %root.display(), "removing previous workspace");
        fs::remove_dir_all(&root).with_context(|| format!("remove {}", root.display()))?;
    }
    fs::create_dir_all(&root).with_context(|| format!("create workspace {}", root.display()))?;
    let root = fs::canonicalize(&root).with_context(|| format!("resolve {}", root.display()))?;

    write_baseline(&root).context("write baseline")?;
    scenario
        .seed(&root)
        .with_context(|| format!("apply seed {}", scenario.name))?;
    let digest = workspace_digest(&root)?;

    info!(root = %root.display(), digest = %&digest[..12], "workspace provisioned");
    Ok(ProvisionedWorkspace {
        scenario,
        root,
        descriptor: scenario.descriptor(),
        digest,
    })
}

/// Hash every file under `root` (sorted relative path and contents).
pub fn workspace_digest(root: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let contents =
            fs::read(entry.path()).with_context(|| format!("read {}", entry.path().display()))?;
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0]);
        hasher.update(&contents);
        hasher.update([0]);
    }
    Ok(hex::encode(hasher.finalize()))
}
