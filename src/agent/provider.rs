//! Reasoning-engine providers
//!
//! The only place the crate talks to a model. Everything above this seam
//! treats a provider as an untrusted black box.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

/// Sampling parameters for a single call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 1000,
        }
    }
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        prompt: String,
        system: Option<String>,
        options: GenerationOptions,
    ) -> Result<String>;
}

pub struct OllamaProvider {
    client: ollama_rs::Ollama,
}

impl OllamaProvider {
    pub fn new(client: ollama_rs::Ollama) -> Self {
        Self { client }
    }

    /// Connect to an Ollama server at `url` (e.g. `http://localhost:11434`).
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = reqwest::Url::parse(url).with_context(|| format!("invalid Ollama url: {}", url))?;
        let port = parsed.port_or_known_default().unwrap_or(11434);
        let host = format!(
            "{}://{}",
            parsed.scheme(),
            parsed.host_str().context("Ollama url has no host")?
        );
        Ok(Self::new(ollama_rs::Ollama::new(host, port)))
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new(ollama_rs::Ollama::default())
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn generate(
        &self,
        model: &str,
        prompt: String,
        system: Option<String>,
        options: GenerationOptions,
    ) -> Result<String> {
        use ollama_rs::generation::chat::{request::ChatMessageRequest, ChatMessage};
        use ollama_rs::models::ModelOptions;

        let mut messages = Vec::new();
        if let Some(sys) = system {
            messages.push(ChatMessage::system(sys));
        }
        messages.push(ChatMessage::user(prompt));

        let model_options = ModelOptions::default()
            .temperature(options.temperature)
            .num_predict(options.max_tokens as i32);

        let res = self
            .client
            .send_chat_messages(ChatMessageRequest::new(model.to_string(), messages).options(model_options))
            .await?;

        Ok(res.message.content)
    }
}

pub struct OpenAICompatibleProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAICompatibleProvider {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn generate(
        &self,
        model: &str,
        prompt: String,
        system: Option<String>,
        options: GenerationOptions,
    ) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(sys) = system {
            messages.push(json!({ "role": "system", "content": sys }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let body = json!({
            "model": model,
            "messages": messages,
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .json(&body);

        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await?.error_for_status()?;
        let json: serde_json::Value = res.json().await?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .context("Failed to parse content from OpenAI response")?;

        Ok(content.to_string())
    }
}
