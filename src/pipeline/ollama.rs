use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::LlmError;
use crate::config::Settings;

/// Text generation with a system prompt. Implemented by the Ollama client and test doubles.
pub trait LlmGenerate {
    fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
}

/// Sampling temperature for every call; low so classification output stays parseable.
const TEMPERATURE: f32 = 0.2;

/// Blocking Ollama HTTP client bound to one model.
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, LlmError> {
        Self::new(
            &settings.ollama_url,
            &settings.model,
            settings.llm_timeout_secs,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl LlmGenerate for OllamaClient {
    fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
            options: GenerateOptions {
                temperature: TEMPERATURE,
            },
        };

        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "Calling Ollama");
        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                LlmError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                LlmError::Timeout(self.timeout_secs)
            } else {
                LlmError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| LlmError::Http(e.to_string()))?;

        if parsed.response.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(parsed.response)
    }
}

/// Test double: returns a fixed reply, or fails every call.
#[cfg(test)]
pub(crate) struct MockLlm {
    reply: Option<String>,
    calls: std::cell::Cell<usize>,
}

#[cfg(test)]
impl MockLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: std::cell::Cell::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reply: None,
            calls: std::cell::Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

#[cfg(test)]
impl LlmGenerate for MockLlm {
    fn generate(&self, _system: &str, _prompt: &str) -> Result<String, LlmError> {
        self.calls.set(self.calls.get() + 1);
        self.reply
            .clone()
            .ok_or_else(|| LlmError::Connection("http://localhost:11434".into()))
    }
}
