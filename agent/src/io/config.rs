//! Agent configuration stored as TOML (default `agent.toml`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Agent configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to the values the
/// demo scenarios were tuned against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Turn budget when the caller does not supply one.
    pub max_turns: u32,

    /// Abort after this many faulty turns in a row.
    pub max_consecutive_failures: u32,

    /// Truncate captured child process stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    pub pipeline: PipelineConfig,
    pub model: ModelConfig,
    pub cache: CacheConfig,
}

/// How the workspace CI pipeline is run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Workspace-relative script whose presence selects `command`.
    pub script: String,
    pub command: Vec<String>,
    pub timeout_secs: u64,
    /// Used when `script` is missing, and by the `run_tests` tool.
    pub fallback_command: Vec<String>,
    pub fallback_timeout_secs: u64,
}

impl PipelineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            script: "ci_pipeline.py".to_string(),
            command: strings(&["python3", "ci_pipeline.py", "."]),
            timeout_secs: 120,
            fallback_command: strings(&["python3", "-m", "pytest", "-v"]),
            fallback_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackendKind {
    /// OpenAI-compatible chat completions over HTTPS.
    Openai,
    /// External CLI reading the prompt on stdin.
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub backend: ModelBackendKind,
    /// Model identifier; `OPENAI_MODEL` overrides it.
    pub name: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub api_base: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Command for the `command` backend (e.g. `["codex","exec","-"]`).
    pub command: Vec<String>,
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackendKind::Openai,
            name: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            top_p: 0.1,
            max_tokens: 1000,
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
            command: strings(&["codex", "exec", "-"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(".cache/llm"),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 20,
            max_consecutive_failures: 3,
            output_limit_bytes: 100_000,
            pipeline: PipelineConfig::default(),
            model: ModelConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 {
            return Err(anyhow!("max_turns must be > 0"));
        }
        if self.max_consecutive_failures == 0 {
            return Err(anyhow!("max_consecutive_failures must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if !non_empty_command(&self.pipeline.command) {
            return Err(anyhow!("pipeline.command must be a non-empty array"));
        }
        if !non_empty_command(&self.pipeline.fallback_command) {
            return Err(anyhow!("pipeline.fallback_command must be a non-empty array"));
        }
        if self.pipeline.timeout_secs == 0 || self.pipeline.fallback_timeout_secs == 0 {
            return Err(anyhow!("pipeline timeouts must be > 0"));
        }
        if self.model.name.trim().is_empty() {
            return Err(anyhow!("model.name must not be empty"));
        }
        if self.model.max_tokens == 0 {
            return Err(anyhow!("model.max_tokens must be > 0"));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(anyhow!("model.temperature must be within 0.0..=2.0"));
        }
        if !(0.0..=1.0).contains(&self.model.top_p) {
            return Err(anyhow!("model.top_p must be within 0.0..=1.0"));
        }
        if self.model.timeout_secs == 0 {
            return Err(anyhow!("model.timeout_secs must be > 0"));
        }
        if self.model.backend == ModelBackendKind::Command
            && !non_empty_command(&self.model.command)
        {
            return Err(anyhow!(
                "model.command must be a non-empty array for the command backend"
            ));
        }
        Ok(())
    }

    /// Apply environment overrides (`OPENAI_MODEL`) using `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("OPENAI_MODEL").filter(|m| !m.trim().is_empty()) {
            self.model.name = model;
        }
    }
}

fn non_empty_command(command: &[String]) -> bool {
    command.first().is_some_and(|program| !program.trim().is_empty())
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
