//! LLM backend trait and the OpenAI-compatible implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Roles ─────────────────────────────────────────────────────────────────────

/// The three roles the engine drives. One endpoint may back all three; the
/// role picks the sampling options and the malformed-output category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmRole {
    Planner,
    Observer,
    Narrator,
}

impl LlmRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmRole::Planner => "planner",
            LlmRole::Observer => "observer",
            LlmRole::Narrator => "narrator",
        }
    }
}

impl std::fmt::Display for LlmRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("LLM call timed out")]
    Timeout,
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
    #[error("{role} output failed to parse after repair retry: {detail}")]
    Malformed { role: LlmRole, detail: String },
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Http(err)
        }
    }
}

impl LlmError {
    /// Stable category string used in logs and error surfaces.
    pub fn category(&self) -> &'static str {
        match self {
            LlmError::Timeout => "llm.timeout",
            LlmError::Malformed { role: LlmRole::Planner, .. } => "llm.malformed_plan",
            LlmError::Malformed { role: LlmRole::Observer, .. } => "llm.malformed_verdict",
            LlmError::Malformed { role: LlmRole::Narrator, .. } => "llm.malformed_narration",
            LlmError::Http(_) => "llm.http",
            LlmError::ApiError { .. } => "llm.api",
            LlmError::Serde(_) => "llm.serde",
            LlmError::Unavailable(_) => "llm.unavailable",
        }
    }
}

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String, // "system" | "user" | "assistant"
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError>;
    fn model_id(&self) -> &str;
    fn is_local(&self) -> bool;
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn parse_openai_response(json: &serde_json::Value, fallback_model: &str) -> LlmResponse {
    LlmResponse {
        content: json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string(),
        model: json["model"].as_str().unwrap_or(fallback_model).to_string(),
        prompt_tokens: json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    }
}

async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = resp.status().as_u16();
    let body: serde_json::Value = resp.json().await?;
    if status >= 400 {
        let msg = body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .unwrap_or("unknown API error")
            .to_string();
        return Err(LlmError::ApiError { status, message: msg });
    }
    Ok(body)
}

// ── OpenAI-compatible backend (llama.cpp, Ollama /v1, Groq, vLLM, …) ─────────

pub struct OpenAiCompatibleBackend {
    pub base_url: String,
    pub model: String,
    api_key: Option<String>,
    local: bool,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into(),
            model: model.into(),
            local: api_key.is_none(),
            api_key,
            client,
        }
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model":       self.model,
            "messages":    req.messages,
            "max_tokens":  req.max_tokens.unwrap_or(4096),
            "temperature": req.temperature.unwrap_or(0.1),
        });
        let resp = self.auth(self.client.post(&url)).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        Ok(parse_openai_response(&json, &self.model))
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn is_local(&self) -> bool {
        self.local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_without_key_is_local() {
        let b = OpenAiCompatibleBackend::new(
            "http://127.0.0.1:8081/v1",
            "phi4mini",
            None,
            Duration::from_secs(60),
        );
        assert!(b.is_local());
        assert_eq!(b.model_id(), "phi4mini");
    }

    #[test]
    fn test_backend_with_key_is_remote() {
        let b = OpenAiCompatibleBackend::new(
            "https://api.groq.com/openai/v1",
            "openai/gpt-oss-20b",
            Some("gsk-test".to_string()),
            Duration::from_secs(60),
        );
        assert!(!b.is_local());
    }

    #[test]
    fn test_parse_openai_response_shape() {
        let json = serde_json::json!({
            "model": "phi4",
            "choices": [{"message": {"content": "hello"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        });
        let resp = parse_openai_response(&json, "fallback");
        assert_eq!(resp.content, "hello");
        assert_eq!(resp.model, "phi4");
        assert_eq!(resp.prompt_tokens, 12);
    }

    #[test]
    fn test_malformed_categories_per_role() {
        let plan = LlmError::Malformed { role: LlmRole::Planner, detail: "x".into() };
        let verdict = LlmError::Malformed { role: LlmRole::Observer, detail: "x".into() };
        assert_eq!(plan.category(), "llm.malformed_plan");
        assert_eq!(verdict.category(), "llm.malformed_verdict");
        assert_eq!(LlmError::Timeout.category(), "llm.timeout");
    }
}
