//! Language model backends.
//!
//! The [`ModelClient`] trait decouples the reasoning engine from the actual
//! model. Two backends exist: an OpenAI-compatible chat-completions endpoint
//! and an external CLI (e.g. `codex exec -`) that reads the prompt on stdin.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::io::config::{ModelBackendKind, ModelConfig};
use crate::io::process::run_command_with_timeout;

/// One deterministic chat completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// Cache key: first 16 hex chars of `sha256("{system}|{user}|{model}|{max_tokens}")`.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(
            format!(
                "{}|{}|{}|{}",
                self.system, self.user, self.model, self.max_tokens
            )
            .as_bytes(),
        );
        let digest = hasher.finalize();
        hex::encode(&digest[..8])
    }
}

/// Abstraction over model backends.
pub trait ModelClient {
    /// Return the raw text of the model's reply.
    fn complete(&self, request: &ChatRequest) -> Result<String>;
}

impl<M: ModelClient + ?Sized> ModelClient for &M {
    fn complete(&self, request: &ChatRequest) -> Result<String> {
        (**self).complete(request)
    }
}

impl<M: ModelClient + ?Sized> ModelClient for Box<M> {
    fn complete(&self, request: &ChatRequest) -> Result<String> {
        (**self).complete(request)
    }
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: [ApiMessage<'a>; 2],
    temperature: f64,
    top_p: f64,
    n: u32,
    max_tokens: u32,
    frequency_penalty: f64,
    presence_penalty: f64,
}

impl<'a> From<&'a ChatRequest> for ApiRequest<'a> {
    fn from(request: &'a ChatRequest) -> Self {
        Self {
            model: &request.model,
            messages: [
                ApiMessage {
                    role: "system",
                    content: &request.system,
                },
                ApiMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            top_p: request.top_p,
            n: 1,
            max_tokens: request.max_tokens,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiReply,
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client (blocking).
pub struct OpenAiChatClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiChatClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

impl ModelClient for OpenAiChatClient {
    #[instrument(skip_all, fields(model = %request.model))]
    fn complete(&self, request: &ChatRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(%url, "sending chat completion");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ApiRequest::from(request))
            .send()
            .with_context(|| format!("POST {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(status = status.as_u16(), "chat completion rejected");
            bail!("chat completion failed with HTTP {status}: {body}");
        }
        let parsed: ApiResponse = response.json().context("decode chat completion")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("chat completion returned no content"))
    }
}

/// Model backed by an external CLI that reads the prompt on stdin and writes
/// the reply to stdout.
pub struct CommandModelClient {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandModelClient {
    pub fn new(command: Vec<String>, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            command,
            timeout,
            output_limit_bytes,
        }
    }
}

impl ModelClient for CommandModelClient {
    #[instrument(skip_all, fields(program = ?self.command.first()))]
    fn complete(&self, request: &ChatRequest) -> Result<String> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("model command is empty"))?;
        let mut cmd = Command::new(program);
        cmd.args(args);
        let prompt = format!("{}\n\n{}", request.system, request.user);

        let output = run_command_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )
        .with_context(|| format!("run model command {}", self.command.join(" ")))?;
        if output.timed_out {
            bail!("model command timed out after {:?}", self.timeout);
        }
        if !output.status.success() {
            bail!(
                "model command failed with status {:?}: {}",
                output.status.code(),
                output.stderr_text().trim()
            );
        }
        Ok(output.stdout_text().trim().to_string())
    }
}

/// Backend selected by configuration.
pub enum ModelBackend {
    OpenAi(OpenAiChatClient),
    Command(CommandModelClient),
}

impl ModelBackend {
    /// Build the configured backend. `lookup` resolves environment variables.
    pub fn from_config<F>(
        config: &ModelConfig,
        output_limit_bytes: usize,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        match config.backend {
            ModelBackendKind::Openai => {
                let api_key = lookup(&config.api_key_env)
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| anyhow!("{} is not set", config.api_key_env))?;
                info!(
                    model = %config.name,
                    base = %config.api_base,
                    "using OpenAI-compatible backend"
                );
                Ok(Self::OpenAi(OpenAiChatClient::new(
                    config.api_base.clone(),
                    api_key,
                    config.timeout(),
                )?))
            }
            ModelBackendKind::Command => {
                info!(command = ?config.command, "using command backend");
                Ok(Self::Command(CommandModelClient::new(
                    config.command.clone(),
                    config.timeout(),
                    output_limit_bytes,
                )))
            }
        }
    }
}

impl ModelClient for ModelBackend {
    fn complete(&self, request: &ChatRequest) -> Result<String> {
        match self {
            Self::OpenAi(client) => client.complete(request),
            Self::Command(client) => client.complete(request),
        }
    }
}
