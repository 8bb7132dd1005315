//! Role-scoped chat client with structured-output parsing.
//!
//! Structured completion is the contract surface: the client extracts the
//! first JSON object from the model's text (tolerating code fences and prose
//! wrappers), deserializes it, and on failure retries exactly once with a
//! repair instruction quoting the parse error. A second failure surfaces as
//! `llm.malformed_plan` / `llm.malformed_verdict` depending on the role.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use vigil_common::config::LlmConfig;

use crate::backend::{
    LlmBackend, LlmError, LlmRequest, LlmRole, Message, OpenAiCompatibleBackend,
};

const REPAIR_INSTRUCTION: &str =
    "Your previous response was not valid JSON for the required schema. \
     Parse error: {error}. \
     Respond again with ONLY the corrected JSON object, no prose, no code fences.";

pub struct ChatClient {
    backend: Arc<dyn LlmBackend>,
    role: LlmRole,
    temperature: f32,
    max_tokens: u32,
}

impl ChatClient {
    pub fn new(backend: Arc<dyn LlmBackend>, role: LlmRole, temperature: f32, max_tokens: u32) -> Self {
        Self { backend, role, temperature, max_tokens }
    }

    pub fn role(&self) -> LlmRole {
        self.role
    }

    /// Free-form text completion.
    pub async fn complete_text(&self, messages: Vec<Message>) -> Result<String, LlmError> {
        let response = self
            .backend
            .complete(LlmRequest {
                messages,
                max_tokens: Some(self.max_tokens),
                temperature: Some(self.temperature),
            })
            .await?;
        tracing::debug!(
            role = self.role.as_str(),
            model = self.backend.model_id(),
            prompt_tokens = response.prompt_tokens,
            completion_tokens = response.completion_tokens,
            "LLM completion"
        );
        Ok(response.content)
    }

    /// Structured completion with one repair retry.
    pub async fn complete_structured<T: DeserializeOwned>(
        &self,
        messages: Vec<Message>,
    ) -> Result<T, LlmError> {
        let first = self.complete_text(messages.clone()).await?;
        let first_err = match parse_structured::<T>(&first) {
            Ok(value) => return Ok(value),
            Err(detail) => detail,
        };

        tracing::warn!(
            role = self.role.as_str(),
            error = %first_err,
            "structured output parse failed, retrying with repair instruction"
        );

        let mut repair = messages;
        repair.push(Message::assistant(first));
        repair.push(Message::user(
            REPAIR_INSTRUCTION.replace("{error}", &first_err),
        ));

        let second = self.complete_text(repair).await?;
        parse_structured::<T>(&second)
            .map_err(|detail| LlmError::Malformed { role: self.role, detail })
    }
}

/// Extract the first JSON object from raw model text and deserialize it.
fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let json = extract_json(raw).ok_or_else(|| "no JSON object found".to_string())?;
    serde_json::from_str(json).map_err(|e| e.to_string())
}

/// Slice from the first '{' to the last '}'. Handles bare JSON, fenced
/// blocks, and prose-wrapped objects alike.
fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Build the chat client for one role from configuration. A "local" provider
/// sends no bearer token; anything else attaches the configured key.
pub fn client_for_role(cfg: &LlmConfig, role: LlmRole) -> ChatClient {
    let role_cfg = match role {
        LlmRole::Planner => &cfg.planner,
        LlmRole::Observer => &cfg.observer,
        LlmRole::Narrator => &cfg.narrator,
    };
    let api_key = if cfg.provider == "local" { None } else { cfg.api_key.clone() };
    let backend = OpenAiCompatibleBackend::new(
        role_cfg.base_url.clone(),
        role_cfg.model.clone(),
        api_key,
        Duration::from_secs(cfg.timeout_secs),
    );
    ChatClient::new(Arc::new(backend), role, role_cfg.temperature, role_cfg.max_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::Mutex;

    use crate::backend::LlmResponse;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        status: String,
        confidence: f64,
    }

    struct ScriptedBackend {
        responses: Mutex<Vec<String>>,
        calls: Mutex<u32>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().map(str::to_string).collect()),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn complete(&self, _req: LlmRequest) -> Result<LlmResponse, LlmError> {
            *self.calls.lock().unwrap() += 1;
            let content = self.responses.lock().unwrap().pop().unwrap_or_default();
            Ok(LlmResponse {
                content,
                model: "scripted".to_string(),
                prompt_tokens: 0,
                completion_tokens: 0,
            })
        }

        fn model_id(&self) -> &str {
            "scripted"
        }

        fn is_local(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_extract_json_from_fenced_block() {
        let raw = "Here you go:\n```json\n{\"status\": \"sufficient\"}\n```";
        assert_eq!(extract_json(raw), Some("{\"status\": \"sufficient\"}"));
    }

    #[test]
    fn test_extract_json_from_bare_object() {
        assert_eq!(extract_json("{\"a\": 1}"), Some("{\"a\": 1}"));
        assert_eq!(extract_json("no json here"), None);
    }

    #[tokio::test]
    async fn test_valid_first_response_needs_one_call() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            "{\"status\": \"sufficient\", \"confidence\": 0.9}",
        ]));
        let client = ChatClient::new(backend.clone(), LlmRole::Observer, 0.1, 512);
        let verdict: Verdict = client
            .complete_structured(vec![Message::user("judge")])
            .await
            .unwrap();
        assert_eq!(verdict.status, "sufficient");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_repair_retry_recovers_from_invalid_json() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            "I think the answer is sufficient!",
            "{\"status\": \"sufficient\", \"confidence\": 0.8}",
        ]));
        let client = ChatClient::new(backend.clone(), LlmRole::Planner, 0.1, 512);
        let verdict: Verdict = client
            .complete_structured(vec![Message::user("plan")])
            .await
            .unwrap();
        assert_eq!(verdict.confidence, 0.8);
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_second_failure_is_malformed_with_role_category() {
        let backend = Arc::new(ScriptedBackend::new(vec!["not json", "still not json"]));
        let client = ChatClient::new(backend.clone(), LlmRole::Planner, 0.1, 512);
        let err = client
            .complete_structured::<Verdict>(vec![Message::user("plan")])
            .await
            .unwrap_err();
        assert_eq!(err.category(), "llm.malformed_plan");
        assert_eq!(backend.call_count(), 2);
    }
}
