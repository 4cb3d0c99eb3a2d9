use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Env var key for the completion API key.
pub const ENV_API_KEY: &str = "AZURE_OPENAI_API_KEY";

const DEFAULT_TEMPERATURE: f32 = 0.7;
const MAX_COMPLETION_TOKENS: usize = 500;

const SYSTEM_PROMPT: &str = "You are the assistant on a personal portfolio website. \
Answer visitors' questions about the site owner's skills, projects, education, \
certificates, and contact details. Keep responses friendly, professional, and \
concise.";

/// A conversation turn in the wire format the completion API expects.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProviderMessage {
    pub role: String,
    pub content: String,
}

impl ProviderMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// An opaque, potentially slow, potentially failing remote text generator.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Generates a free-text reply to `message`, given a bounded window of
    /// prior role-tagged turns.
    async fn complete(&self, message: &str, history: &[ProviderMessage]) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ProviderMessage>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct AzureOpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AzureOpenAiProvider {
    /// Builds the client. An empty `api_key` is allowed so the service can
    /// start without credentials; completion calls will then fail and the
    /// caller degrades to its fallback reply.
    pub fn new(base_url: String, api_key: String, model: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    fn build_messages(&self, message: &str, history: &[ProviderMessage]) -> Vec<ProviderMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ProviderMessage::new("system", SYSTEM_PROMPT));
        messages.extend(history.iter().cloned());
        messages.push(ProviderMessage::new("user", message));
        messages
    }
}

#[async_trait]
impl LanguageModel for AzureOpenAiProvider {
    fn name(&self) -> &'static str {
        "AzureOpenAI"
    }

    async fn complete(&self, message: &str, history: &[ProviderMessage]) -> Result<String> {
        if self.api_key.is_empty() {
            bail!("{ENV_API_KEY} not set");
        }

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: self.build_messages(message, history),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: MAX_COMPLETION_TOKENS,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|err| anyhow!("Completion request failed: {err}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_owned());
            bail!("Completion API error {status}: {body}");
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|err| anyhow!("Failed to parse completion response: {err}"))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("Completion response contained no choices"))
    }
}
