//! Environment lookup with a `.env.local` fallback.
//!
//! Secrets such as the model API key may live in a dotenv file next to the
//! config instead of the shell environment. The process environment always
//! wins; the file only fills in keys that are unset.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Dotenv file name looked up beside the config file.
pub const ENV_FILE: &str = ".env.local";

#[derive(Debug, Clone, Default)]
pub struct Env {
    file: HashMap<String, String>,
}

impl Env {
    /// Load `path` if it exists. A missing file gives an empty fallback.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let entries = dotenvy::from_path_iter(path)
            .with_context(|| format!("open {}", path.display()))?;
        let file = entries
            .collect::<Result<HashMap<_, _>, _>>()
            .with_context(|| format!("parse {}", path.display()))?;
        debug!(path = %path.display(), keys = file.len(), "loaded env file");
        Ok(Self { file })
    }

    /// Load the dotenv file that sits beside `config_path`.
    pub fn for_config(config_path: &Path) -> Result<Self> {
        Self::load(&env_file_for(config_path))
    }

    /// Process value of `key`, else the file's, ignoring blank values.
    pub fn get(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.file.get(key).cloned())
    }
}

pub fn env_file_for(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(ENV_FILE),
        _ => PathBuf::from(ENV_FILE),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let env = Env::load(&temp.path().join(ENV_FILE)).expect("load");
        assert_eq!(env.get("AGENT_ENV_TEST_UNSET_KEY"), None);
    }

    #[test]
    fn file_fills_unset_keys() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(ENV_FILE);
        fs::write(&path, "# local secrets\nAGENT_ENV_TEST_KEY=sk-local\n").expect("write");
        let env = Env::load(&path).expect("load");
        assert_eq!(env.get("AGENT_ENV_TEST_KEY").as_deref(), Some("sk-local"));
    }

    #[test]
    fn process_environment_wins() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(ENV_FILE);
        fs::write(&path, "PATH=/from/env/file\n").expect("write");
        let env = Env::load(&path).expect("load");
        assert_ne!(env.get("PATH").as_deref(), Some("/from/env/file"));
    }

    #[test]
    fn env_file_sits_beside_config() {
        assert_eq!(
            env_file_for(Path::new("agent.toml")),
            PathBuf::from(ENV_FILE)
        );
        assert_eq!(
            env_file_for(Path::new("conf/agent.toml")),
            Path::new("conf").join(ENV_FILE)
        );
    }
}
