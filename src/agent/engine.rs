//! Reasoning Engine
//!
//! Wraps a provider with one agent's model and system prompt. All fuzzy JSON
//! scraping lives here: `complete_structured` either returns a value that
//! matches the caller's schema or the caller's default, never an error.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::provider::{GenerationOptions, LLMProvider};
use super::types::{AgentConfig, GenerationParams};
use super::truncate;
use crate::error::EngineError;

/// Output of a schema-bound request.
#[derive(Debug, Clone, PartialEq)]
pub struct Structured<T> {
    pub value: T,
    /// True when `value` is (partly) the schema default.
    pub degraded: bool,
}

/// One agent's session with the reasoning engine.
#[derive(Clone)]
pub struct ReasoningEngine {
    provider: Arc<dyn LLMProvider>,
    model: String,
    system_prompt: String,
    params: GenerationParams,
}

impl ReasoningEngine {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            system_prompt: system_prompt.into(),
            params: GenerationParams::default(),
        }
    }

    pub fn from_config(provider: Arc<dyn LLMProvider>, config: &AgentConfig) -> Self {
        Self::new(provider, config.model.clone(), config.system_prompt.clone()).with_params(config.params.clone())
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Single free-text completion. Empty content counts as a failure.
    pub async fn complete(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Result<String, EngineError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "engine request");

        let content = self
            .provider
            .generate(
                &self.model,
                prompt.to_string(),
                Some(self.system_prompt.clone()),
                GenerationOptions { temperature, max_tokens },
            )
            .await?;

        if content.trim().is_empty() {
            return Err(EngineError::EmptyResponse);
        }

        debug!(model = %self.model, "engine response: {}", truncate(&content, 120));
        Ok(content)
    }

    /// Explanatory pre-pass. Never used for control flow; failures yield "".
    pub async fn think_aloud(&self, prompt: &str) -> String {
        match self
            .complete(prompt, self.params.reasoning_temperature, self.params.reasoning_max_tokens)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(model = %self.model, "reasoning pre-pass failed: {}", e);
                String::new()
            }
        }
    }

    /// Schema-bound request. `fallback` doubles as the schema shown to the
    /// model and as the value returned on any failure.
    pub async fn complete_structured<T>(&self, prompt: &str, fallback: T) -> Structured<T>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        let schema = serde_json::to_string_pretty(&fallback).unwrap_or_else(|_| "{}".to_string());
        let structured_prompt = format!(
            "{}\n\nRespond in valid JSON format matching this schema:\n{}\n\nReturn ONLY valid JSON, no additional text.",
            prompt, schema
        );

        let response = match self
            .complete(
                &structured_prompt,
                self.params.structured_temperature,
                self.params.structured_max_tokens,
            )
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(model = %self.model, "structured request failed, using schema defaults: {}", e);
                return Structured { value: fallback, degraded: true };
            }
        };

        match parse_structured(&response, &fallback) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(model = %self.model, "unparsable structured response, using schema defaults: {}", e);
                Structured { value: fallback, degraded: true }
            }
        }
    }
}

/// Parse-or-default contract. Finds the first balanced JSON value of the same
/// shape as `fallback` in `response`, keeps every key whose JSON type agrees
/// with the default, and fills the rest from `fallback`. A field that still
/// does not deserialize into `T` is reset on its own; arrays keep only the
/// elements that fit.
pub fn parse_structured<T>(response: &str, fallback: &T) -> Result<Structured<T>, EngineError>
where
    T: Serialize + DeserializeOwned,
{
    let template = serde_json::to_value(fallback)?;
    let (open, close, expected) = match &template {
        Value::Array(_) => ('[', ']', "JSON array"),
        _ => ('{', '}', "JSON object"),
    };

    let segment = extract_balanced(response, open, close).ok_or(EngineError::MissingDelimiters { expected })?;
    let parsed: Value = serde_json::from_str(segment)?;

    let mut degraded = false;
    let mut merged = merge_with_defaults(&template, parsed, &mut degraded);
    if !fits::<T>(&merged) {
        degraded = true;
        merged = repair_fields::<T>(&template, merged);
    }
    let value = serde_json::from_value(merged)?;

    Ok(Structured { value, degraded })
}

/// First balanced `open ... close` span, ignoring delimiters inside strings.
/// Falls back to first-open/last-close when nothing balances.
pub fn extract_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn same_kind(default: &Value, candidate: &Value) -> bool {
    matches!(
        (default, candidate),
        (Value::Null, _)
            | (Value::Bool(_), Value::Bool(_))
            | (Value::Number(_), Value::Number(_))
            | (Value::String(_), Value::String(_))
            | (Value::Array(_), Value::Array(_))
            | (Value::Object(_), Value::Object(_))
    )
}

fn merge_with_defaults(template: &Value, parsed: Value, degraded: &mut bool) -> Value {
    match (template, parsed) {
        (Value::Object(defaults), Value::Object(mut found)) => {
            let mut merged = serde_json::Map::with_capacity(defaults.len());
            for (key, default) in defaults {
                let value = match found.remove(key) {
                    Some(candidate) if same_kind(default, &candidate) => {
                        merge_with_defaults(default, candidate, degraded)
                    }
                    _ => {
                        *degraded = true;
                        default.clone()
                    }
                };
                merged.insert(key.clone(), value);
            }
            Value::Object(merged)
        }
        (_, parsed) => parsed,
    }
}

fn fits<T: DeserializeOwned>(value: &Value) -> bool {
    serde_json::from_value::<T>(value.clone()).is_ok()
}

/// Re-admit parsed fields one at a time on top of the defaults.
fn repair_fields<T: DeserializeOwned>(template: &Value, merged: Value) -> Value {
    match (template, merged) {
        (Value::Object(defaults), Value::Object(mut found)) => {
            let mut repaired = defaults.clone();
            for (key, default) in defaults {
                let Some(candidate) = found.remove(key) else {
                    continue;
                };
                let with = |value: &Value| {
                    let mut trial = repaired.clone();
                    trial.insert(key.clone(), value.clone());
                    fits::<T>(&Value::Object(trial))
                };
                let value = if with(&candidate) {
                    candidate
                } else {
                    match candidate {
                        Value::Array(items) => Value::Array(
                            items
                                .into_iter()
                                .filter(|item| with(&Value::Array(vec![item.clone()])))
                                .collect(),
                        ),
                        _ => default.clone(),
                    }
                };
                repaired.insert(key.clone(), value);
            }
            Value::Object(repaired)
        }
        (_, Value::Array(items)) => Value::Array(
            items
                .into_iter()
                .filter(|item| fits::<T>(&Value::Array(vec![item.clone()])))
                .collect(),
        ),
        (template, _) => template.clone(),
    }
}
